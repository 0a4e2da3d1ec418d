pub mod address;
pub mod error;
pub mod value;

pub use address::*;
pub use error::*;
pub use value::*;

#[cfg(all(test, feature = "serde"))]
mod serde_tests {
    use super::*;

    #[test]
    fn values_serialize() {
        let v = LiteralValue::Error(
            ExcelError::new(ExcelErrorKind::Ref).with_origin(CellAddress::new(1, 2, 3)),
        );
        let json = serde_json::to_string(&v).unwrap();
        let back: LiteralValue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, v);
    }
}
