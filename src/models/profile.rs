// src/models/profile.rs

//! Faculty profile data structures.
//!
//! The classification service answers with loosely typed JSON, so
//! [`ProfileJudgement::from_value`] decodes every field leniently instead of
//! relying on derived deserialization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::models::SiteContext;

/// Sex code as stored with a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum Sex {
    #[default]
    Unknown,
    Male,
    Female,
}

impl From<u8> for Sex {
    fn from(code: u8) -> Self {
        match code {
            1 => Sex::Male,
            2 => Sex::Female,
            _ => Sex::Unknown,
        }
    }
}

impl From<Sex> for u8 {
    fn from(sex: Sex) -> Self {
        match sex {
            Sex::Unknown => 0,
            Sex::Male => 1,
            Sex::Female => 2,
        }
    }
}

impl Sex {
    fn from_value(value: &Value) -> Self {
        match value {
            Value::Number(n) => n.as_u64().map_or(Sex::Unknown, |code| {
                u8::try_from(code).map_or(Sex::Unknown, Sex::from)
            }),
            Value::String(s) => match s.trim().to_lowercase().as_str() {
                "1" | "男" | "male" | "m" => Sex::Male,
                "2" | "女" | "female" | "f" => Sex::Female,
                _ => Sex::Unknown,
            },
            _ => Sex::Unknown,
        }
    }
}

/// Fields extracted from a single-person page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileFields {
    pub name: String,
    #[serde(default)]
    pub sex: Sex,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub tel: String,
    #[serde(default)]
    pub college_name: String,
    /// Academic rank, e.g. professor
    #[serde(default)]
    pub title: String,
    /// Administrative position, e.g. dean
    #[serde(default)]
    pub job_title: String,
    #[serde(default)]
    pub research_direction: String,
    #[serde(default)]
    pub papers: String,
    #[serde(default)]
    pub bookname: String,
    #[serde(default)]
    pub sciencep_bookname: String,
    #[serde(default)]
    pub is_national_fund: bool,
    #[serde(default)]
    pub is_cs: bool,
    #[serde(default)]
    pub is_pub_book: bool,
    #[serde(default)]
    pub is_pub_book_sciencep: bool,
}

/// The classifier's verdict on one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileJudgement {
    /// Whether the page describes exactly one person
    pub is_profile: bool,
    pub fields: ProfileFields,
}

impl ProfileJudgement {
    /// Decode a judgement from a JSON object, tolerating loose typing.
    ///
    /// Returns `None` when the value is not an object.
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let text = |key: &str| obj.get(key).map(as_text).unwrap_or_default();
        let flag = |key: &str| obj.get(key).is_some_and(as_flag);

        let fields = ProfileFields {
            name: text("name"),
            sex: obj.get("sex").map(Sex::from_value).unwrap_or_default(),
            email: normalize_email(&text("email")),
            tel: text("tel"),
            college_name: {
                // The service contract spells it "collage_name".
                let name = text("collage_name");
                if name.is_empty() { text("college_name") } else { name }
            },
            title: text("title"),
            job_title: text("job_title"),
            research_direction: text("research_direction"),
            papers: text("papers"),
            bookname: text("bookname"),
            sciencep_bookname: text("sciencep_bookname"),
            is_national_fund: flag("is_national_fun"),
            is_cs: flag("is_cs"),
            is_pub_book: flag("is_pub_book"),
            is_pub_book_sciencep: flag("is_pub_book_sciencep"),
        };

        let is_profile = flag("is_teacher_page") && !fields.name.is_empty();
        Some(Self { is_profile, fields })
    }
}

/// A profile judged to describe one person, ready to be persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileCandidate {
    /// Stable identifier derived from the homepage
    pub id: String,

    /// Site the profile was discovered on
    pub site_id: String,

    /// Page the profile was extracted from
    pub homepage: String,

    /// Title of that page
    #[serde(default)]
    pub page_title: String,

    #[serde(flatten)]
    pub fields: ProfileFields,

    pub discovered_at: DateTime<Utc>,
}

impl ProfileCandidate {
    /// Tag extracted fields with the site context and source page.
    pub fn new(fields: ProfileFields, site: &SiteContext, homepage: &str, page_title: &str) -> Self {
        Self {
            id: Self::make_id(homepage),
            site_id: site.site_id.clone(),
            homepage: homepage.to_string(),
            page_title: page_title.to_string(),
            fields,
            discovered_at: Utc::now(),
        }
    }

    /// Short hash of the homepage URL.
    pub fn make_id(homepage: &str) -> String {
        let digest = Sha256::digest(homepage.as_bytes());
        hex::encode(&digest[..8])
    }
}

fn as_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.trim().to_string(),
        Value::Array(items) => items
            .iter()
            .map(as_text)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("; "),
        other => other.to_string(),
    }
}

fn as_flag(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|v| v != 0.0),
        Value::String(s) => matches!(
            s.trim().to_lowercase().as_str(),
            "true" | "yes" | "1" | "是"
        ),
        _ => false,
    }
}

fn normalize_email(raw: &str) -> String {
    // Sites obfuscate addresses as "name(at)pku.edu.cn" or "name#pku.edu.cn".
    raw.replace("(at)", "@")
        .replace("[at]", "@")
        .replace("（at）", "@")
        .replace('#', "@")
        .replace(' ', "")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_strict_profile() {
        let value = json!({
            "is_teacher_page": true,
            "name": "Li Wei",
            "sex": 1,
            "email": "liwei(at)pku.edu.cn",
            "is_cs": true,
            "papers": ["Paper A", "Paper B"]
        });

        let judgement = ProfileJudgement::from_value(&value).unwrap();
        assert!(judgement.is_profile);
        assert_eq!(judgement.fields.name, "Li Wei");
        assert_eq!(judgement.fields.sex, Sex::Male);
        assert_eq!(judgement.fields.email, "liwei@pku.edu.cn");
        assert!(judgement.fields.is_cs);
        assert_eq!(judgement.fields.papers, "Paper A; Paper B");
    }

    #[test]
    fn test_loose_types() {
        let value = json!({
            "is_teacher_page": "true",
            "name": "王芳",
            "sex": "2",
            "is_national_fun": "是",
            "collage_name": "信息学院"
        });

        let judgement = ProfileJudgement::from_value(&value).unwrap();
        assert!(judgement.is_profile);
        assert_eq!(judgement.fields.sex, Sex::Female);
        assert!(judgement.fields.is_national_fund);
        assert_eq!(judgement.fields.college_name, "信息学院");
    }

    #[test]
    fn test_not_profile_without_flag_or_name() {
        let no_flag = json!({"name": "Li Wei"});
        assert!(!ProfileJudgement::from_value(&no_flag).unwrap().is_profile);

        let no_name = json!({"is_teacher_page": true, "name": ""});
        assert!(!ProfileJudgement::from_value(&no_name).unwrap().is_profile);

        assert!(ProfileJudgement::from_value(&json!([1, 2])).is_none());
    }

    #[test]
    fn test_sex_serializes_as_code() {
        let fields = ProfileFields {
            name: "Li Wei".to_string(),
            sex: Sex::Female,
            ..ProfileFields::default()
        };
        let value = serde_json::to_value(&fields).unwrap();
        assert_eq!(value["sex"], json!(2));
    }

    #[test]
    fn test_make_id_is_stable() {
        let a = ProfileCandidate::make_id("https://cs.example.edu.cn/info/1.htm");
        let b = ProfileCandidate::make_id("https://cs.example.edu.cn/info/1.htm");
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
    }
}
