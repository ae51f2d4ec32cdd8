use crate::models::activity::ActivitySnapshot;
use crate::models::category::Category;

pub const URL_MAX_CHARS: usize = 150;
pub const CONTENT_MAX_CHARS: usize = 7000;

/// Category ids are withheld from the model on purpose: it reasons and
/// answers by name only, and the decision engine maps name to id
/// afterwards. Models hallucinate ids; they rarely hallucinate a name they
/// were just shown.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryOption {
    pub name: String,
    pub description: Option<String>,
}

impl CategoryOption {
    pub fn from_categories(categories: &[Category]) -> Vec<CategoryOption> {
        categories
            .iter()
            .map(|c| CategoryOption {
                name: c.name.clone(),
                description: c.description.clone(),
            })
            .collect()
    }
}

pub fn category_system_prompt() -> String {
    "You categorize a single snapshot of what a user is doing on their computer \
into exactly one of their self-defined activity categories.\n\
Rules:\n\
- Judge the activity by its content and purpose, not the hosting platform. \
A technical tutorial on a video site is work even when entertainment on the \
same site is not.\n\
- An activity tangential to a stated goal (for example booking travel for a \
business trip) supports that goal; do not default it to a distraction.\n\
- If you are confident the activity fits none of the categories and is \
unrelated to the stated goals, choose the most distraction-like category \
rather than leaving it uncategorized.\n\
- chosenCategoryName must be copied verbatim from the category list.\n\
Respond with a single JSON object {\"chosenCategoryName\": string, \
\"summary\": string, \"reasoning\": string} and nothing else."
        .to_string()
}

pub fn category_user_prompt(
    goals: &str,
    categories: &[CategoryOption],
    snapshot: &ActivitySnapshot,
) -> String {
    let mut category_lines = String::new();
    for category in categories {
        match &category.description {
            Some(description) if !description.is_empty() => {
                category_lines.push_str(&format!("- {}: {}\n", category.name, description));
            }
            _ => category_lines.push_str(&format!("- {}\n", category.name)),
        }
    }

    format!(
        "User's projects and goals:\n{}\n\nCategories:\n{}\nCurrent activity:\n{}",
        goals,
        category_lines,
        render_snapshot(snapshot)
    )
}

pub fn summary_system_prompt() -> String {
    "You write one short sentence describing what a user was doing, based on a \
snapshot of their screen activity. Plain text, no preamble."
        .to_string()
}

pub fn summary_user_prompt(snapshot: &ActivitySnapshot) -> String {
    format!(
        "Describe this activity in one sentence:\n{}",
        render_snapshot(snapshot)
    )
}

fn render_snapshot(snapshot: &ActivitySnapshot) -> String {
    let mut lines = String::new();
    if let Some(owner) = &snapshot.owner_name {
        lines.push_str(&format!("App: {}\n", owner));
    }
    if let Some(title) = &snapshot.title {
        lines.push_str(&format!("Window title: {}\n", title));
    }
    if let Some(url) = &snapshot.url {
        lines.push_str(&format!("URL: {}\n", truncate_chars(url, URL_MAX_CHARS)));
    }
    if let Some(content) = &snapshot.content {
        lines.push_str(&format!(
            "Visible content: {}\n",
            truncate_chars(content, CONTENT_MAX_CHARS)
        ));
    }
    if let Some(duration_ms) = snapshot.duration_ms {
        lines.push_str(&format!("Duration: {}s\n", duration_ms / 1000));
    }
    lines
}

fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}
