//! Initialize a blog in a directory.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

/// Run the init command.
pub async fn run(root: &Path, config_path: &Path, yes: bool) -> Result<()> {
    tracing::info!("Initializing quire...");

    let content_dir = root.join("content");

    // Check if content already exists
    if content_dir.exists() && !yes {
        tracing::warn!("content/ directory already exists. Use --yes to overwrite.");
        return Ok(());
    }

    let posts_dir = content_dir.join("posts");
    fs::create_dir_all(&posts_dir).context("Failed to create content directory")?;
    fs::create_dir_all(root.join("resources")).context("Failed to create resources directory")?;

    let config_path = root.join(config_path);
    if !config_path.exists() || yes {
        fs::write(&config_path, DEFAULT_CONFIG)
            .with_context(|| format!("Failed to write {}", config_path.display()))?;
        tracing::info!("Created {}", config_path.display());
    }

    let post_path = posts_dir.join("hello-world.md");
    if !post_path.exists() || yes {
        fs::write(&post_path, DEFAULT_POST).context("Failed to write hello-world.md")?;
        tracing::info!("Created content/posts/hello-world.md");
    }

    tracing::info!("Initialization complete!");
    tracing::info!("Run 'quire build' to generate the site.");

    Ok(())
}

const DEFAULT_CONFIG: &str = r#"# quire configuration

[site]
name = "My Blog"
url = "https://example.com/"
description = "Notes and announcements"
language = "en"

[content]
# Markdown sources, one subdirectory per section
dir = "content"
# Copied verbatim into the output
resources = "resources"
output = "public"

[[sections]]
id = "posts"
title = "Posts"
sort = { key = "date", order = "descending" }

[feed]
sections = ["posts"]
max_items = 20

[build]
minify = true
clean = true
plugins = ["heading-anchors", "external-links"]

# [deploy]
# provider = "git"
# remote = "git@github.com:user/user.github.io.git"
# branch = "gh-pages"
"#;

const DEFAULT_POST: &str = r#"---
title: Hello, World
date: 2024-01-01
tags: [meta]
description: The first post.
---

Welcome to your new blog.

## Writing posts

Add markdown files under `content/posts/`. Each file starts with front-matter
holding at least a `title` and a `date`.
"#;
