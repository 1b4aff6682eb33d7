//! Formatting helpers shared by log statements across the monitor.

/// Shortens a hash or identifier for log output.
///
/// Shows only the first 10 characters followed by ".." for longer strings,
/// which keeps the `0x` prefix plus 8 hex digits of an Ethereum hash.
pub fn truncate_id(id: &str) -> String {
	match id.char_indices().nth(10) {
		Some((idx, _)) => format!("{}..", &id[..idx]),
		None => id.to_string(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_truncate_id() {
		assert_eq!(truncate_id("0123456789"), "0123456789");
		assert_eq!(truncate_id("0x1234567890abcdef"), "0x12345678..");
		assert_eq!(truncate_id(""), "");
	}
}
