pub const DRAFT_DATA: &str = r#"---
title: Intro to Testing
description: "Why tests: a primer"
date: 2024-04-22
author: thiago
tags: [testing, rust, ci]
draft: true
---

# Intro to Testing

Tests are the cheapest way to find out that something broke.

## Unit tests

Keep them close to the code they check.
"#;

pub const DRAFT_WITH_BLOCK_TAGS: &str = r#"---
title: 'Astro: content collections'
slug: astro-content-collections
category: Code
heroImage: ""
tags:
  - astro
  - markdown
  - ssg
draft: true
---
Collections give every post a typed frontmatter.
"#;

pub const PUBLISHED_DATA: &str = r#"---
title: Hello Astro
slug: hello-astro
description: First post on the new site
pubDate: 2024-03-05T10:30:00Z
category: Code
tags: ["astro", "web"]
status: Published
draft: false
---

Welcome to the new blog.
"#;

pub const CONFIG_DATA: &str = r#"
[paths]
drafts_dir = "content/drafts"
published_dir = "content/published"
images_dir = "public/images"

[server]
address = "127.0.0.1"
port = 8001

[admin]
username = "editor"

[generator]
content_model = "gemini-2.5-pro"
timeout_secs = 30

[log]
level = "Debug"
log_to_console = true
"#;
