/// Writing hint for the editor, based on length and subject.
pub fn suggest(content: &str) -> &'static str {
    let len = content.chars().count();
    if len < 50 {
        "Consider adding more detail to your content."
    } else if len > 500 {
        "This is quite comprehensive! Maybe break it down into smaller sections?"
    } else if content.to_lowercase().contains("astro") {
        "Great job mentioning Astro! Keep up the good work."
    } else {
        "This looks like a good start!"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suggest() {
        assert_eq!(suggest("short astro"), "Consider adding more detail to your content.");
        assert_eq!(suggest(&"a".repeat(501)), "This is quite comprehensive! Maybe break it down into smaller sections?");

        let medium = "Building a static site with ASTRO is pleasant and quick to set up.";
        assert_eq!(suggest(medium), "Great job mentioning Astro! Keep up the good work.");

        let medium = "Building a static site with a generator is pleasant and quick to set up.";
        assert_eq!(suggest(medium), "This looks like a good start!");
    }
}
