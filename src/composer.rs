use chrono::{DateTime, NaiveDate};
use htmlescape::{encode_attribute, encode_minimal};

use crate::config::Profile;
use crate::models::{PostDescriptor, RepositorySummary};

const HOT_RELOAD_SCRIPT: &str = r#"
<script>
    const socket = new WebSocket("ws://" + window.location.host + "/ws");
    socket.onmessage = (event) => {
        if (event.data === "reload") {
            window.location.reload();
        }
    };
</script>
"#;

// Mirrors `nav_visible`: the bar is shown once the profile header has been
// observed and is out of view. The repository region is swapped in once the
// fragment arrives; on failure it stays empty.
const HOME_SCRIPT: &str = r#"
<script>
    (function () {
        const nav = document.getElementById("site-nav");
        const marker = document.getElementById("profile");
        if (nav && marker && "IntersectionObserver" in window) {
            new IntersectionObserver((entries) => {
                for (const entry of entries) {
                    nav.dataset.visible = entry.isIntersecting ? "false" : "true";
                }
            }, { root: null }).observe(marker);
        }
        const region = document.getElementById("repositories");
        if (region) {
            fetch("/fragments/repos")
                .then((res) => (res.ok ? res.text() : null))
                .then((html) => { if (html) { region.outerHTML = html; } })
                .catch(() => {});
        }
    })();
</script>
"#;

/// Latest observation of the profile header against the viewport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Intersection {
    pub is_intersecting: bool,
}

/// The navigation bar gets prominence only after the header has been
/// observed scrolling out of view. No observation yet means hidden.
pub fn nav_visible(observation: Option<Intersection>) -> bool {
    matches!(observation, Some(Intersection { is_intersecting: false }))
}

pub struct HomePage<'a> {
    pub profile: &'a Profile,
    pub posts: &'a [PostDescriptor],
    /// `None` while the repository list has not arrived.
    pub repos: Option<&'a [RepositorySummary]>,
    pub show_nav: bool,
}

/// Formats `YYYY-MM-DD` and RFC 3339 dates as `January 5, 2024`. Anything
/// else is shown as written.
pub fn display_date(raw: &str) -> String {
    let raw = raw.trim();
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()));
    match date {
        Some(d) => d.format("%B %-d, %Y").to_string(),
        None => raw.to_string(),
    }
}

fn render_header(profile: &Profile) -> String {
    let avatar = if profile.avatar.is_empty() {
        String::new()
    } else {
        format!(
            "<img class=\"profile-image\" src=\"{}\" alt=\"{}\">",
            encode_attribute(&profile.avatar),
            encode_attribute(&profile.name)
        )
    };
    format!(
        "<header id=\"profile\" class=\"profile\">{}<div><h1>{}</h1><h2>{}</h2></div><p class=\"intro\">{}</p></header>",
        avatar,
        encode_minimal(&profile.name),
        encode_minimal(&profile.headline),
        encode_minimal(&profile.intro)
    )
}

fn render_navigation(show_nav: bool) -> String {
    format!(
        "<nav id=\"site-nav\" class=\"site-nav\" data-visible=\"{}\"><a href=\"/\">Home</a><a href=\"/#projects\">Projects</a><a href=\"/#posts\">Posts</a></nav>",
        show_nav
    )
}

/// The repository region on its own, so it can be served as a fragment
/// once the list resolves.
pub fn render_repositories(repos: Option<&[RepositorySummary]>) -> String {
    let Some(repos) = repos else {
        return "<div id=\"repositories\" class=\"content-links\" data-state=\"pending\"></div>".to_string();
    };

    let mut items = String::new();
    for repo in repos {
        items.push_str(&format!(
            "<div class=\"content-link\" data-key=\"{}\"><a href=\"{}\"><h3 class=\"content-link-title\">{}</h3><p class=\"content-link-text\">{}</p></a></div>",
            encode_attribute(&repo.id.to_string()),
            encode_attribute(&repo.url),
            encode_minimal(&repo.name),
            encode_minimal(&repo.description)
        ));
    }
    format!(
        "<div id=\"repositories\" class=\"content-links\" data-state=\"resolved\">{}</div>",
        items
    )
}

pub fn render_posts(posts: &[PostDescriptor]) -> String {
    let mut items = String::new();
    for (index, post) in posts.iter().enumerate() {
        let fm = &post.frontmatter;
        let text = fm
            .description()
            .map(|d| format!("<p class=\"content-link-text\">{}</p>", encode_minimal(d)))
            .unwrap_or_default();
        let date = fm
            .date()
            .map(|d| {
                format!(
                    "<time datetime=\"{}\">{}</time>",
                    encode_attribute(d),
                    encode_minimal(&display_date(d))
                )
            })
            .unwrap_or_default();
        let tags: String = fm
            .tags()
            .iter()
            .map(|t| format!("<li>{}</li>", encode_minimal(t)))
            .collect();
        let tags = if tags.is_empty() {
            tags
        } else {
            format!("<ul class=\"tags\">{}</ul>", tags)
        };
        items.push_str(&format!(
            "<div class=\"content-link\" data-key=\"{}\"><a href=\"/blog/{}\"><h3 class=\"content-link-title\">{}</h3>{}{}</a>{}</div>",
            index,
            encode_attribute(&post.slug),
            encode_minimal(post.display_title()),
            text,
            date,
            tags
        ));
    }
    format!("<div id=\"post-links\" class=\"content-links\">{}</div>", items)
}

fn render_home_content(page: &HomePage<'_>) -> String {
    format!(
        "{}<section id=\"projects\" class=\"region\"><h2><a href=\"/#projects\">Projects</a></h2>{}</section><section id=\"posts\" class=\"region\"><h2><a href=\"/#posts\">Posts</a></h2>{}</section>",
        render_header(page.profile),
        render_repositories(page.repos),
        render_posts(page.posts)
    )
}

/// Substitutes every placeholder in one left-to-right pass, so text coming
/// from a value is never scanned for further placeholders.
pub fn fill_placeholders(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    loop {
        let next = values
            .iter()
            .filter_map(|(key, value)| rest.find(*key).map(|at| (at, *key, *value)))
            .min_by_key(|(at, _, _)| *at);
        let Some((at, key, value)) = next else {
            out.push_str(rest);
            return out;
        };
        out.push_str(&rest[..at]);
        out.push_str(value);
        rest = &rest[at + key.len()..];
    }
}

/// Fills the shared layout. `scripts` goes right before `</body>`.
pub fn render_with_layout(
    layout: &str,
    title: &str,
    navigation: &str,
    content: &str,
    scripts: &str,
    is_development: bool,
) -> String {
    let mut scripts = scripts.to_string();
    if is_development {
        scripts.push_str(HOT_RELOAD_SCRIPT);
    }

    let body_end = format!("{}</body>", scripts);
    let title = encode_minimal(title);
    fill_placeholders(
        layout,
        &[
            ("</body>", body_end.as_str()),
            ("{{ title }}", title.as_str()),
            ("{{ navigation }}", navigation),
            ("{{ content }}", content),
        ],
    )
}

pub fn compose_home(layout: &str, page: &HomePage<'_>, is_development: bool) -> String {
    render_with_layout(
        layout,
        &page.profile.name,
        &render_navigation(page.show_nav),
        &render_home_content(page),
        HOME_SCRIPT,
        is_development,
    )
}

/// Wraps an already-rendered post body in the post template.
pub fn compose_post(
    layout: &str,
    post_template: &str,
    post: &PostDescriptor,
    body_html: &str,
    is_development: bool,
) -> String {
    let date = post
        .frontmatter
        .date()
        .map(display_date)
        .unwrap_or_default();
    let title = encode_minimal(post.display_title());
    let date = encode_minimal(&date);
    let article = fill_placeholders(
        post_template,
        &[
            ("{{ title }}", title.as_str()),
            ("{{ date }}", date.as_str()),
            ("{{ body }}", body_html),
        ],
    );

    render_with_layout(
        layout,
        post.display_title(),
        &render_navigation(true),
        &article,
        "",
        is_development,
    )
}

pub fn compose_not_found(
    layout: &str,
    not_found_template: &str,
    slug: &str,
    is_development: bool,
) -> String {
    let slug = encode_minimal(slug);
    let body = fill_placeholders(not_found_template, &[("{{slug}}", slug.as_str())]);
    render_with_layout(
        layout,
        "Not found",
        &render_navigation(true),
        &body,
        "",
        is_development,
    )
}
