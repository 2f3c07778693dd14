use super::*;

#[test]
fn viewport_rejects_degenerate_sizes() {
    assert!(Viewport::new(0, 10, 1.0).is_err());
    assert!(Viewport::new(10, 0, 1.0).is_err());
    assert!(Viewport::new(10, 10, 0.0).is_err());
    assert!(Viewport::new(10, 10, f64::NAN).is_err());
    assert!(Viewport::new(10, 10, 1.5).is_ok());
}

#[test]
fn scaled_size_rounds() {
    let v = Viewport::new(101, 50, 1.5).unwrap();
    assert_eq!(v.scaled_size(), (152, 75));
}

#[test]
fn decimal_width_counts_digits() {
    assert_eq!(decimal_width(0), 1);
    assert_eq!(decimal_width(4), 1);
    assert_eq!(decimal_width(9), 1);
    assert_eq!(decimal_width(10), 2);
    assert_eq!(decimal_width(19), 2);
    assert_eq!(decimal_width(1000), 4);
}
