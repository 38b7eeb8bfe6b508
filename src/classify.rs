//! Keyword classification of activity records into coarse categories.
//!
//! Rules are ordered: the first match wins, so an editor window playing a
//! YouTube video still counts as Coding. Matching is case-insensitive
//! substring containment over whatever text the capture layer managed to
//! collect.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    Coding,
    Email,
    Entertainment,
    Debugging,
    General,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Coding => "Coding",
            Category::Email => "Email",
            Category::Entertainment => "Entertainment",
            Category::Debugging => "Debugging",
            Category::General => "General",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn classify_activity(app_name: &str, window_title: &str, ocr_text: &str) -> Category {
    let app_name = app_name.to_lowercase();
    let window_title = window_title.to_lowercase();
    let ocr_text = ocr_text.to_lowercase();

    if app_name.contains("code.exe")
        || app_name.contains("visual studio code")
        || app_name.contains("sublime_text")
    {
        Category::Coding
    } else if window_title.contains("outlook") || window_title.contains("gmail") {
        Category::Email
    } else if window_title.contains("youtube") || window_title.contains("netflix") {
        Category::Entertainment
    } else if ocr_text.contains("error")
        || ocr_text.contains("debug")
        || ocr_text.contains("traceback")
    {
        Category::Debugging
    } else {
        Category::General
    }
}
