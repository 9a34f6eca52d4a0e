use chrono::{NaiveDate, Utc};

use drafted::content::frontmatter::encode;
use drafted::content::slug::derive_slug_or;
use drafted::content::{FieldValue, Frontmatter, PostDocument, STATUS_DRAFT};
use drafted::util::os_helper::get_name;
use drafted::workflow::ContentWorkflow;

use crate::NewArgs;

fn get_author(args: &NewArgs) -> String {
    if let Some(ref name) = args.name {
        return name.clone();
    }

    get_name()
}

fn render_draft(title: &str, author: &str, date: NaiveDate) -> PostDocument {
    let mut frontmatter = Frontmatter::new();
    frontmatter.set("title", FieldValue::text(title));
    frontmatter.set("description", FieldValue::text(""));
    frontmatter.set("date", FieldValue::Date(date));
    frontmatter.set("author", FieldValue::text(author));
    frontmatter.set("tags", FieldValue::List(vec![]));
    frontmatter.set("draft", FieldValue::Bool(true));
    frontmatter.set("status", FieldValue::text(STATUS_DRAFT));

    let body = format!(
        "\n# {}\n\nThis is a body example\nPlease remove it and replace with your content\n",
        title
    );
    PostDocument::new(frontmatter, body)
}

pub fn new_cmd(args: &NewArgs, workflow: Option<&ContentWorkflow>) -> anyhow::Result<()> {
    let author = get_author(args);
    let doc = render_draft(&args.title, &author, Utc::now().date_naive());

    match workflow {
        None => print!("{}", encode(&doc)?),
        Some(workflow) => {
            let slug = derive_slug_or(Some(&args.title), "untitled");
            let path = workflow.save_draft(&slug, &doc)?;
            println!("Created draft {}", path.display());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use drafted::content::frontmatter::decode;

    use super::*;

    #[test]
    fn test_render_draft() {
        let date = NaiveDate::from_ymd_opt(2024, 2, 27).unwrap();
        let doc = render_draft("This is a title", "Thiago", date);

        assert_eq!(doc.title(), Some("This is a title"));
        assert_eq!(doc.frontmatter.get_str("author"), Some("Thiago"));
        assert_eq!(doc.frontmatter.get("date"), Some(&FieldValue::Date(date)));
        assert_eq!(doc.frontmatter.get("draft"), Some(&FieldValue::Bool(true)));
        assert_eq!(doc.status(), Some(STATUS_DRAFT));
        assert!(doc.frontmatter.tags().is_empty());
        assert!(doc.body.starts_with("\n# This is a title\n"));

        let decoded = decode(&encode(&doc).unwrap()).unwrap();
        assert_eq!(decoded, doc);
    }
}
