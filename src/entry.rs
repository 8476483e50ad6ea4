//! Helper methods for extracting data from search results.
use ldap3::SearchEntry;

/// An extension trait for [`SearchEntry`] that provides convenience methods for
/// extracting data.
pub trait SearchEntryExt {
	/// Get all values of an attribute. Attributes that are missing or whose
	/// values are not valid UTF-8 yield an empty slice.
	fn attr_values(&self, attr: &str) -> &[String];
}

impl SearchEntryExt for SearchEntry {
	fn attr_values(&self, attr: &str) -> &[String] {
		match self.attrs.get(attr) {
			Some(values) => values,
			None => &[],
		}
	}
}

#[cfg(test)]
mod tests {
	use std::collections::HashMap;

	use ldap3::SearchEntry;

	use super::SearchEntryExt;

	#[test]
	fn attr_values() {
		let entry = SearchEntry {
			dn: String::from("dc=example,dc=org"),
			attrs: [(
				String::from("contextCSN"),
				vec![
					String::from("20240101120000.123456Z#000000#001#000000"),
					String::from("20240101120005.000000Z#000000#002#000000"),
				],
			)]
			.into_iter()
			.collect(),
			bin_attrs: HashMap::default(),
		};
		assert!(
			entry.attr_values("attribute_does_not_exist").is_empty(),
			"Undefined attributes should have no values"
		);
		assert_eq!(entry.attr_values("contextCSN").len(), 2, "Should return every value");
		assert_eq!(entry.attr_values("contextCSN")[1], "20240101120005.000000Z#000000#002#000000");
	}
}
