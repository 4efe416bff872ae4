use serde::{Deserialize, Serialize};

/// The two languages the venue's knowledge base and customers use.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
	En,
	Th,
}

impl Language {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::En => "en",
			Self::Th => "th",
		}
	}

	/// Resolve the working language for a piece of text. An explicit hint
	/// wins; otherwise Thai script decides, and anything else is treated
	/// as English.
	pub fn detect(text: &str, hint: Option<Language>) -> Language {
		if let Some(hint) = hint {
			return hint;
		}
		if text.chars().any(is_thai_char) {
			return Language::Th;
		}

		match whatlang::detect(text) {
			Some(info) if info.lang() == whatlang::Lang::Tha => Language::Th,
			_ => Language::En,
		}
	}
}

fn is_thai_char(ch: char) -> bool {
	('\u{0E00}'..='\u{0E7F}').contains(&ch)
}
