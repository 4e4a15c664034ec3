//! Validated region and bucket-name value objects.
//!
//! Both types can only be built through their validating constructors; an
//! invalid value is rejected outright rather than producing a partial
//! instance.

use std::fmt;
use std::str::FromStr;

use crate::errors::ValidationError;

/// An S3 region code such as `us-east-1`.
///
/// Any non-empty string of lowercase ASCII letters, digits and hyphens is
/// accepted, so S3-compatible stores with custom region names work too.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Region(String);

impl Region {
    pub fn new(value: &str) -> Result<Self, ValidationError> {
        if value.is_empty() {
            return Err(ValidationError::InvalidRegion {
                value: value.to_string(),
            });
        }

        for ch in value.chars() {
            if !ch.is_ascii_lowercase() && !ch.is_ascii_digit() && ch != '-' {
                return Err(ValidationError::InvalidRegion {
                    value: value.to_string(),
                });
            }
        }

        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Region {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// A bucket name: at least 3 characters among lowercase letters, digits,
/// hyphens and periods.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BucketName(String);

impl BucketName {
    pub fn new(name: &str) -> Result<Self, ValidationError> {
        if name.len() < 3 {
            return Err(ValidationError::InvalidBucketName {
                name: name.to_string(),
            });
        }

        for ch in name.chars() {
            if !ch.is_ascii_lowercase() && !ch.is_ascii_digit() && ch != '-' && ch != '.' {
                return Err(ValidationError::InvalidBucketName {
                    name: name.to_string(),
                });
            }
        }

        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BucketName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for BucketName {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_valid() {
        assert_eq!(Region::new("us-east-1").unwrap().as_str(), "us-east-1");
        assert!(Region::new("doesnt-matter-here").is_ok());
        assert!(Region::new("1").is_ok());
    }

    #[test]
    fn test_region_invalid() {
        assert!(Region::new("").is_err());
        assert!(Region::new("US-EAST-1").is_err());
        assert!(Region::new("us_east_1").is_err());
        assert!(Region::new("us east").is_err());
        let err = Region::new("eu.west").unwrap_err();
        assert!(err.to_string().contains("eu.west"));
    }

    #[test]
    fn test_bucket_name_valid() {
        assert!(BucketName::new("my-bucket").is_ok());
        assert!(BucketName::new("my.bucket.name").is_ok());
        assert!(BucketName::new("abc").is_ok());
    }

    #[test]
    fn test_bucket_name_invalid() {
        assert!(BucketName::new("ab").is_err());
        assert!(BucketName::new("My-Bucket").is_err());
        assert!(BucketName::new("my_bucket").is_err());
        assert!(BucketName::new("").is_err());
    }
}
