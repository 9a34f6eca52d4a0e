use std::fmt::Write;

use crate::duplicate::ContextEntry;
use crate::generator::Outline;

/// Upper bound of existing posts listed in a prompt.
const MAX_CONTEXT_ENTRIES: usize = 25;

fn existing_posts(context: &[ContextEntry]) -> String {
    if context.is_empty() {
        return "The blog has no published posts yet.\n".to_string();
    }

    let mut buf = String::from("Posts already published on the blog (avoid repeating them):\n");
    for entry in context.iter().take(MAX_CONTEXT_ENTRIES) {
        if entry.tags.is_empty() {
            let _ = writeln!(&mut buf, "- {}", entry.title);
        } else {
            let _ = writeln!(&mut buf, "- {} [{}]", entry.title, entry.tags.join(", "));
        }
    }
    buf
}

pub fn outline_prompt(topic: &str, context: &[ContextEntry]) -> String {
    format!(
        r#"You are planning a technical blog post about: "{topic}".

{existing}
Return only a JSON object with this shape:
{{"title": "<post title>", "sections": ["<section heading>", "..."]}}
Use between 3 and 7 sections, ordered as they should appear in the post."#,
        topic = topic,
        existing = existing_posts(context),
    )
}

pub fn section_prompt(section_title: &str, topic: &str, outline: &Outline, context: &[ContextEntry]) -> String {
    let mut headings = String::new();
    for section in &outline.sections {
        let marker = if section == section_title { " <- write this one" } else { "" };
        let _ = writeln!(&mut headings, "- {}{}", section, marker);
    }

    format!(
        r#"You are writing the blog post "{title}" about "{topic}".

The post has these sections:
{headings}
{existing}
Write the body of the section "{section}" in Markdown. Do not repeat the
section heading and do not write the other sections. Return only the Markdown."#,
        title = outline.title,
        topic = topic,
        headings = headings,
        existing = existing_posts(context),
        section = section_title,
    )
}

pub fn seo_prompt(full_text: &str, topic: &str) -> String {
    format!(
        r#"Here is a blog post about "{topic}":

{full_text}

Return only a JSON object with this shape:
{{"seoTitle": "<title under 60 characters>", "metaDescription": "<description under 160 characters>", "tags": ["<lowercase tag>", "..."]}}"#,
        topic = topic,
        full_text = full_text,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outline_prompt_lists_context() {
        let context = vec![ContextEntry {
            title: "Async Rust".to_string(),
            tags: vec!["rust".to_string(), "async".to_string()],
        }];
        let prompt = outline_prompt("Tokio internals", &context);
        assert!(prompt.contains("\"Tokio internals\""));
        assert!(prompt.contains("- Async Rust [rust, async]"));
        assert!(prompt.contains(r#"{"title": "<post title>""#));
    }

    #[test]
    fn test_section_prompt_marks_current_section() {
        let outline = Outline {
            title: "Tokio".to_string(),
            sections: vec!["Intro".to_string(), "Runtime".to_string()],
        };
        let prompt = section_prompt("Runtime", "tokio", &outline, &[]);
        assert!(prompt.contains("- Runtime <- write this one"));
        assert!(prompt.contains("- Intro\n"));
        assert!(prompt.contains("no published posts"));
    }
}
