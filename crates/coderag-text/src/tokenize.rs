use regex::Regex;
use std::sync::LazyLock;

static CAMEL_BOUNDARY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"([a-z])([A-Z])").expect("static regex"));
static WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[a-z0-9]+").expect("static regex"));

/// Split code-ish text into lowercase sub-word tokens.
///
/// `getUserName`, `get_user_name` and `GET user-name` all yield
/// `["get", "user", "name"]`. Tokens of a single character are dropped;
/// repeats are kept so term frequencies survive.
pub fn tokenize(text: &str) -> Vec<String> {
	let split = CAMEL_BOUNDARY.replace_all(text, "$1 $2");
	let lowered = split.to_lowercase().replace('_', " ");
	WORD.find_iter(&lowered)
		.map(|m| m.as_str())
		.filter(|t| t.len() > 1)
		.map(str::to_string)
		.collect()
}

#[cfg(test)]
mod tests {
	use super::tokenize;
	use std::collections::BTreeSet;

	fn set(text: &str) -> BTreeSet<String> { tokenize(text).into_iter().collect() }

	#[test]
	fn camel_and_snake_agree() {
		let expected: BTreeSet<String> = ["get", "user", "name"].iter().map(|s| s.to_string()).collect();
		assert_eq!(set("getUserName"), expected);
		assert_eq!(set("get_user_name"), expected);
	}

	#[test]
	fn drops_single_chars_and_punctuation() {
		assert_eq!(tokenize("a = b + foo(x, y2)"), vec!["foo", "y2"]);
		assert!(tokenize("").is_empty());
		assert!(tokenize("  _ - ! ").is_empty());
	}

	#[test]
	fn keeps_repeats_in_order() {
		assert_eq!(tokenize("def login(): return auth_token"), vec!["def", "login", "return", "auth", "token"]);
		assert_eq!(tokenize("user User USER"), vec!["user", "user", "user"]);
	}
}
