use std::fmt::Write;

use chrono::NaiveDate;

use crate::content::{FieldValue, Frontmatter, PostDocument, STATUS_DRAFT};
use crate::generator::{GeneratorSettings, SectionContent, SeoMeta};

/// Builds the draft document for a finished generation run.
pub fn format_document(
    h1_title: &str,
    sections: &[SectionContent],
    seo: &SeoMeta,
    slug: &str,
    settings: &GeneratorSettings,
    today: NaiveDate,
) -> PostDocument {
    let title = if seo.seo_title.trim().is_empty() { h1_title } else { seo.seo_title.as_str() };

    let frontmatter: Frontmatter = vec![
        ("title", FieldValue::text(title)),
        ("description", FieldValue::text(seo.meta_description.as_str())),
        ("date", FieldValue::Date(today)),
        ("author", FieldValue::text(settings.author.as_str())),
        ("category", FieldValue::text(settings.default_category.as_str())),
        ("tags", FieldValue::List(seo.tags.clone())),
        ("slug", FieldValue::text(slug)),
        ("draft", FieldValue::Bool(true)),
        ("status", FieldValue::text(STATUS_DRAFT)),
    ].into_iter().collect();

    let mut body = String::new();
    let _ = write!(&mut body, "\n# {}\n\n", h1_title);
    for section in sections {
        let _ = write!(&mut body, "## {}\n{}\n\n", section.title, section.content);
    }
    let body = format!("{}\n", body.trim_end());

    PostDocument::new(frontmatter, body)
}

#[cfg(test)]
mod tests {
    use crate::content::frontmatter;

    use super::*;

    fn sections() -> Vec<SectionContent> {
        vec![
            SectionContent { title: "Why".to_string(), content: "Because.".to_string() },
            SectionContent { title: "How".to_string(), content: "Carefully.\n\n".to_string() },
        ]
    }

    fn seo() -> SeoMeta {
        SeoMeta {
            seo_title: "Testing in Rust".to_string(),
            meta_description: "A short guide".to_string(),
            tags: vec!["rust".to_string(), "testing".to_string()],
        }
    }

    #[test]
    fn test_format_document() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let doc = format_document("Testing", &sections(), &seo(), "testing-in-rust", &GeneratorSettings::default(), today);

        assert_eq!(doc.frontmatter.get_str("title"), Some("Testing in Rust"));
        assert_eq!(doc.frontmatter.get_str("author"), Some("AI Assistant"));
        assert_eq!(doc.frontmatter.get_str("category"), Some("General"));
        assert_eq!(doc.frontmatter.get("date"), Some(&FieldValue::Date(today)));
        assert_eq!(doc.frontmatter.tags(), ["rust", "testing"]);
        assert_eq!(doc.slug(), Some("testing-in-rust"));
        assert_eq!(doc.status(), Some("Draft"));
        assert_eq!(doc.body, "\n# Testing\n\n## Why\nBecause.\n\n## How\nCarefully.\n");

        let encoded = frontmatter::encode(&doc).unwrap();
        assert!(encoded.starts_with("---\ntitle: Testing in Rust\n"));
        assert_eq!(frontmatter::decode(&encoded).unwrap(), doc);
    }

    #[test]
    fn test_title_falls_back_to_h1() {
        let mut seo = seo();
        seo.seo_title = " ".to_string();
        let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let doc = format_document("Testing", &[], &seo, "testing", &GeneratorSettings::default(), today);

        assert_eq!(doc.title(), Some("Testing"));
        assert_eq!(doc.body, "\n# Testing\n");
    }
}
