// src/services/classifier.rs

//! Region locating and profile extraction through the classification service.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::models::ProfileJudgement;
use crate::services::llm::ChatModel;
use crate::services::reducer::truncate;

/// Longest span scanned for a balanced JSON object.
const MAX_JSON_SPAN: usize = 64 * 1024;

const REGION_SYSTEM: &str = "You are a precise web page structure analyzer. \
You identify the requested content region of a page.";

const PROFILE_SYSTEM: &str = "You are a precise web page content analyzer. \
You extract faculty member information accurately.";

/// Inputs for one profile extraction call.
#[derive(Debug, Clone)]
pub struct ProfileRequest<'a> {
    pub url: &'a str,
    pub title: &'a str,
    /// Markdown-like page text
    pub text: &'a str,
    /// Known author names for this site
    pub author_hints: &'a [String],
}

/// The two calls the traversal engine makes to the classification service.
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Return a CSS selector for the page's main content region.
    async fn locate_region(&self, reduced_html: &str, url: &str) -> Result<String>;

    /// Judge whether the page is a single-person profile.
    ///
    /// `Ok(None)` means the answer could not be parsed.
    async fn extract_profile(&self, request: &ProfileRequest<'_>) -> Result<Option<ProfileJudgement>>;
}

/// Classifier backed by a chat model.
pub struct LlmClassifier<M> {
    model: M,
    max_payload_chars: usize,
}

impl<M: ChatModel> LlmClassifier<M> {
    pub fn new(model: M, max_payload_chars: usize) -> Self {
        Self {
            model,
            max_payload_chars,
        }
    }

    fn region_prompt(&self, reduced_html: &str, url: &str) -> String {
        format!(
            "The HTML page below is usually made of:\n\
             1. a top navigation bar\n\
             2. the main content area\n\
             3. a bottom navigation bar\n\
             4. a footer\n\n\
             Identify region 2, the main content area, and return an exact CSS selector for it.\n\n\
             Page URL: {url}\n\
             HTML:\n{}\n\n\
             Return only one CSS selector with no explanation.",
            truncate(reduced_html, self.max_payload_chars)
        )
    }

    fn profile_prompt(&self, request: &ProfileRequest<'_>) -> String {
        let hints = if request.author_hints.is_empty() {
            String::new()
        } else {
            format!(
                "Known faculty names for this site: {}\n",
                request.author_hints.join(", ")
            )
        };

        format!(
            "Analyze the page content below. If it is the detail page introducing one single \
             teacher, lecturer, associate professor, professor, researcher or academician, \
             extract their information.\n\
             Return only JSON that can be parsed directly, with no extra text, in this shape:\n\
             {{\n\
               \"is_teacher_page\": false,  // bool; false if the page introduces more than one \
             person or is a department faculty list\n\
               \"name\": \"full name\",\n\
               \"sex\": 0,  // int; 0 unknown, 1 male, 2 female\n\
               \"is_national_fun\": false,  // bool; leads a national fund project such as NSFC\n\
               \"is_cs\": false,  // bool; works in computing\n\
               \"bookname\": \"published book titles\",\n\
               \"sciencep_bookname\": \"book titles published by Science Press\",\n\
               \"is_pub_book\": false,  // bool; has published a monograph\n\
               \"is_pub_book_sciencep\": false,  // bool; has published with Science Press\n\
               \"collage_name\": \"department name\",\n\
               \"title\": \"academic rank, e.g. professor\",\n\
               \"job_title\": \"position, e.g. dean\",\n\
               \"tel\": \"phone\",\n\
               \"email\": \"email as a standard address\",\n\
               \"research_direction\": \"research interests\",\n\
               \"papers\": \"one or two representative papers\"\n\
             }}\n\n\
             Page URL: {}\n\
             Page title: {}\n\
             {hints}\n\
             Page content:\n{}",
            request.url,
            request.title,
            truncate(request.text, self.max_payload_chars)
        )
    }
}

#[async_trait]
impl<M: ChatModel> Classifier for LlmClassifier<M> {
    async fn locate_region(&self, reduced_html: &str, url: &str) -> Result<String> {
        let answer = self
            .model
            .complete(REGION_SYSTEM, &self.region_prompt(reduced_html, url))
            .await?;
        let selector = clean_selector(&answer);
        log::debug!("Region selector for {url}: {selector:?}");
        Ok(selector)
    }

    async fn extract_profile(&self, request: &ProfileRequest<'_>) -> Result<Option<ProfileJudgement>> {
        let answer = self
            .model
            .complete(PROFILE_SYSTEM, &self.profile_prompt(request))
            .await?;
        log::debug!("Profile answer for {}: {}", request.url, answer);

        let judgement = parse_judgement(&answer);
        if judgement.is_none() {
            log::warn!("Unparseable classifier answer for {}: {}", request.url, answer);
        }
        Ok(judgement)
    }
}

/// Parse a classifier answer in two stages.
///
/// The whole answer is tried as JSON first, then the first balanced `{...}`
/// span inside it.
pub fn parse_judgement(answer: &str) -> Option<ProfileJudgement> {
    let answer = answer.trim();
    if let Ok(value) = serde_json::from_str::<Value>(answer) {
        if let Some(judgement) = ProfileJudgement::from_value(&value) {
            return Some(judgement);
        }
    }

    let span = extract_json_object(answer)?;
    let value = serde_json::from_str::<Value>(span).ok()?;
    ProfileJudgement::from_value(&value)
}

/// First balanced `{...}` span, ignoring braces inside string literals.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if offset > MAX_JSON_SPAN {
            return None;
        }
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Reduce a free-form region answer to a bare selector.
pub fn clean_selector(answer: &str) -> String {
    answer
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !line.starts_with("```"))
        .unwrap_or_default()
        .trim_matches(|c| c == '`' || c == '"' || c == '\'')
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    struct ScriptedModel {
        answer: String,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedModel {
        fn new(answer: &str) -> Self {
            Self {
                answer: answer.to_string(),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedModel {
        async fn complete(&self, _system: &str, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(self.answer.clone())
        }
    }

    #[test]
    fn test_parse_strict_json() {
        let judgement =
            parse_judgement(r#"{"is_teacher_page": true, "name": "Li Wei"}"#).unwrap();
        assert!(judgement.is_profile);
        assert_eq!(judgement.fields.name, "Li Wei");
    }

    #[test]
    fn test_parse_embedded_json() {
        let answer = r#"Sure, here is the result: {"is_teacher_page": true, "name": "Li Wei"}"#;
        let judgement = parse_judgement(answer).unwrap();
        assert!(judgement.is_profile);
        assert_eq!(judgement.fields.name, "Li Wei");
    }

    #[test]
    fn test_parse_fenced_json_with_trailing_text() {
        let answer = "```json\n{\"is_teacher_page\": false, \"name\": \"\"}\n```\nHope this helps {:}";
        let judgement = parse_judgement(answer).unwrap();
        assert!(!judgement.is_profile);
    }

    #[test]
    fn test_parse_garbage_is_none() {
        assert!(parse_judgement("I cannot tell.").is_none());
        assert!(parse_judgement("{ not json at all }").is_none());
        assert!(parse_judgement("{\"is_teacher_page\": true").is_none());
    }

    #[test]
    fn test_extract_json_object_ignores_braces_in_strings() {
        let text = r#"x {"name": "a}b", "n": {"k": "\"}"}} y"#;
        assert_eq!(
            extract_json_object(text),
            Some(r#"{"name": "a}b", "n": {"k": "\"}"}}"#)
        );
        assert_eq!(extract_json_object("no braces"), None);
    }

    #[test]
    fn test_clean_selector() {
        assert_eq!(clean_selector("div.main-content"), "div.main-content");
        assert_eq!(clean_selector("```css\n#content .wrap\n```"), "#content .wrap");
        assert_eq!(clean_selector("`div.list`"), "div.list");
        assert_eq!(clean_selector(""), "");
    }

    #[tokio::test]
    async fn test_llm_classifier_region() {
        let classifier = LlmClassifier::new(ScriptedModel::new("```\ndiv#main\n```"), 100);
        let selector = classifier
            .locate_region("<html><body><div id=\"main\"></div></body></html>", "https://a.cn/")
            .await
            .unwrap();
        assert_eq!(selector, "div#main");
    }

    #[tokio::test]
    async fn test_llm_classifier_profile_prompt_bounded() {
        let model = ScriptedModel::new(r#"{"is_teacher_page": true, "name": "王芳"}"#);
        let classifier = LlmClassifier::new(model, 50);
        let hints = vec!["王芳".to_string()];
        let text = "x".repeat(500);

        let judgement = classifier
            .extract_profile(&ProfileRequest {
                url: "https://a.cn/t/1.htm",
                title: "王芳",
                text: &text,
                author_hints: &hints,
            })
            .await
            .unwrap()
            .unwrap();
        assert!(judgement.is_profile);

        let prompts = classifier.model.prompts.lock().unwrap();
        assert!(prompts[0].contains("Known faculty names for this site: 王芳"));
        assert!(!prompts[0].contains(&"x".repeat(51)));
    }
}
