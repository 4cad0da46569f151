//! Property-based tests for host to tenant key mapping

use proptest::prelude::*;
use xfhub::backend::middleware::tenant::tenant_key;

proptest! {
    #[test]
    fn test_key_is_first_label_lowercased(
        label in "[A-Za-z0-9-]{1,20}",
        rest in proptest::collection::vec("[a-z0-9-]{1,10}", 0..4),
        port in proptest::option::of(1u16..),
    ) {
        let mut host = std::iter::once(label.clone()).chain(rest).collect::<Vec<_>>().join(".");
        if let Some(port) = port {
            host = format!("{}:{}", host, port);
        }
        prop_assert_eq!(tenant_key(&host), Some(label.to_ascii_lowercase()));
    }

    #[test]
    fn test_key_ignores_case(host in "[a-zA-Z]{1,12}\\.example\\.com") {
        prop_assert_eq!(tenant_key(&host), tenant_key(&host.to_ascii_uppercase()));
    }

    #[test]
    fn test_never_panics(host in ".*") {
        if let Some(key) = tenant_key(&host) {
            prop_assert!(!key.is_empty());
            prop_assert!(!key.contains('.'));
        }
    }
}

#[test]
fn test_unusable_hosts() {
    assert_eq!(tenant_key(""), None);
    assert_eq!(tenant_key(":8080"), None);
    assert_eq!(tenant_key(".example.com"), None);
    assert_eq!(tenant_key("[::1]:3000"), None);
}
