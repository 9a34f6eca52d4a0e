use anyhow::Result;

use drafted::workflow::ContentWorkflow;

use crate::{FileArgs, ListArgs, ListTarget, SlugArgs};

pub fn approve_cmd(args: &FileArgs, workflow: &ContentWorkflow) -> Result<()> {
    let approval = workflow.approve(&args.file)?;
    println!("Published '{}' as {}", args.file, approval.published_path.display());
    Ok(())
}

pub fn reject_cmd(args: &FileArgs, workflow: &ContentWorkflow) -> Result<()> {
    workflow.reject(&args.file)?;
    println!("Deleted draft '{}'", args.file);
    Ok(())
}

pub fn unpublish_cmd(args: &SlugArgs, workflow: &ContentWorkflow) -> Result<()> {
    let unpublished = workflow.unpublish(&args.slug)?;
    println!("Moved '{}' back to {}", unpublished.slug, unpublished.draft_path.display());
    Ok(())
}

pub fn list_cmd(args: &ListArgs, workflow: &ContentWorkflow) -> Result<()> {
    let repository = workflow.repository();
    match args.target {
        ListTarget::Drafts => {
            for draft in repository.list_drafts()? {
                println!("{:<40} {:<10} {}",
                         draft.file_name,
                         draft.status.as_deref().unwrap_or("-"),
                         draft.title.as_deref().unwrap_or("(untitled)"));
            }
        }
        ListTarget::Published => {
            for entry in repository.list_published()? {
                let date = entry.date
                    .map(|date| date.format("%Y-%m-%d").to_string())
                    .unwrap_or_else(|| "-".to_string());
                println!("{:<40} {:<10} {}", entry.slug, date, entry.title);
            }
        }
    }
    Ok(())
}
