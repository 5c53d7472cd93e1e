use authcore_errors::InvalidGroupName;

/// Check a name can be used for an authorisation group.
///
/// Group names are used in entity locators so they can't be empty
/// and can't contain forward slashes or colons.
pub fn validate_group_name(name: &str) -> Result<(), InvalidGroupName> {
    if name.is_empty() {
        return Err(InvalidGroupName::new(name, "group name cannot be empty"));
    }
    if name.contains('/') {
        return Err(InvalidGroupName::new(
            name,
            "group name cannot contain a forward slash",
        ));
    }
    if name.contains(':') {
        return Err(InvalidGroupName::new(name, "group name cannot contain a colon"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::validate_group_name;

    #[test]
    fn valid_names() {
        for name in ["g1", "valid-name", "with space", "ünïcode", "a.b_c"] {
            assert!(validate_group_name(name).is_ok(), "{} should be valid", name);
        }
    }

    #[test]
    fn invalid_names() {
        let error = validate_group_name("").unwrap_err();
        assert_eq!(error.reason, "group name cannot be empty");
        let error = validate_group_name("a/b").unwrap_err();
        assert_eq!(error.reason, "group name cannot contain a forward slash");
        let error = validate_group_name("a:b").unwrap_err();
        assert_eq!(error.reason, "group name cannot contain a colon");
    }
}
