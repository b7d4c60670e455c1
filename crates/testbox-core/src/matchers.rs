//! The closed matcher set exposed by `expect(actual)`
//!
//! Each matcher owns a JS check of the shape
//! `(actual, expected, option) => string | null`: `null` means the
//! assertion holds, a string is the failure message. The checks run inside
//! the shim closure and may use its helpers (`render`, `deepEqual`,
//! `isNumeric`, `orderable`, `isNaNValue`, `mathAbs`, `mathPow`).

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Matcher {
    ToBe,
    ToEqual,
    ToBeTruthy,
    ToBeFalsy,
    ToBeNull,
    ToBeUndefined,
    ToBeDefined,
    ToBeNaN,
    ToBeCloseTo,
    ToBeGreaterThan,
    ToBeLessThan,
}

impl Matcher {
    pub const ALL: [Matcher; 11] = [
        Matcher::ToBe,
        Matcher::ToEqual,
        Matcher::ToBeTruthy,
        Matcher::ToBeFalsy,
        Matcher::ToBeNull,
        Matcher::ToBeUndefined,
        Matcher::ToBeDefined,
        Matcher::ToBeNaN,
        Matcher::ToBeCloseTo,
        Matcher::ToBeGreaterThan,
        Matcher::ToBeLessThan,
    ];

    /// Property name on the object returned by `expect`
    pub fn name(&self) -> &'static str {
        match self {
            Matcher::ToBe => "toBe",
            Matcher::ToEqual => "toEqual",
            Matcher::ToBeTruthy => "toBeTruthy",
            Matcher::ToBeFalsy => "toBeFalsy",
            Matcher::ToBeNull => "toBeNull",
            Matcher::ToBeUndefined => "toBeUndefined",
            Matcher::ToBeDefined => "toBeDefined",
            Matcher::ToBeNaN => "toBeNaN",
            Matcher::ToBeCloseTo => "toBeCloseTo",
            Matcher::ToBeGreaterThan => "toBeGreaterThan",
            Matcher::ToBeLessThan => "toBeLessThan",
        }
    }

    pub fn signature(&self) -> &'static str {
        match self {
            Matcher::ToBe => "toBe(expected)",
            Matcher::ToEqual => "toEqual(expected)",
            Matcher::ToBeTruthy => "toBeTruthy()",
            Matcher::ToBeFalsy => "toBeFalsy()",
            Matcher::ToBeNull => "toBeNull()",
            Matcher::ToBeUndefined => "toBeUndefined()",
            Matcher::ToBeDefined => "toBeDefined()",
            Matcher::ToBeNaN => "toBeNaN()",
            Matcher::ToBeCloseTo => "toBeCloseTo(expected, digits = 2)",
            Matcher::ToBeGreaterThan => "toBeGreaterThan(expected)",
            Matcher::ToBeLessThan => "toBeLessThan(expected)",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Matcher::ToBe => "strict equality (===), no coercion",
            Matcher::ToEqual => "recursive structural equality, key order ignored",
            Matcher::ToBeTruthy => "value coerces to true",
            Matcher::ToBeFalsy => "value coerces to false",
            Matcher::ToBeNull => "value is exactly null",
            Matcher::ToBeUndefined => "value is undefined",
            Matcher::ToBeDefined => "value is not undefined",
            Matcher::ToBeNaN => "value is the number NaN",
            Matcher::ToBeCloseTo => "|actual - expected| <= 10^-digits / 2",
            Matcher::ToBeGreaterThan => "actual > expected for two numbers, bigints or strings",
            Matcher::ToBeLessThan => "actual < expected for two numbers, bigints or strings",
        }
    }

    pub fn from_name(name: &str) -> Option<Matcher> {
        Matcher::ALL.iter().copied().find(|m| m.name() == name)
    }

    /// JS check evaluated inside the shim closure
    pub fn check_js(&self) -> &'static str {
        match self {
            Matcher::ToBe => {
                r#"(actual, expected) => actual === expected
        ? null
        : "Expected " + render(expected) + " but got " + render(actual)"#
            }
            Matcher::ToEqual => {
                r#"(actual, expected) => deepEqual(actual, expected, [])
        ? null
        : "Expected " + render(expected) + " but got " + render(actual)"#
            }
            Matcher::ToBeTruthy => {
                r#"(actual) => actual ? null : "Expected " + render(actual) + " to be truthy""#
            }
            Matcher::ToBeFalsy => {
                r#"(actual) => actual ? "Expected " + render(actual) + " to be falsy" : null"#
            }
            Matcher::ToBeNull => {
                r#"(actual) => actual === null ? null : "Expected " + render(actual) + " to be null""#
            }
            Matcher::ToBeUndefined => {
                r#"(actual) => actual === undefined
        ? null
        : "Expected " + render(actual) + " to be undefined""#
            }
            Matcher::ToBeDefined => {
                r#"(actual) => actual !== undefined ? null : "Expected value to be defined, got undefined""#
            }
            Matcher::ToBeNaN => {
                r#"(actual) => isNaNValue(actual) ? null : "Expected " + render(actual) + " to be NaN""#
            }
            Matcher::ToBeCloseTo => {
                r#"(actual, expected, digits) => {
        if (!isNumeric(actual) || !isNumeric(expected)) {
            return "toBeCloseTo expects numbers, got " + render(actual) + " and " + render(expected);
        }
        const precision = digits === undefined ? 2 : digits;
        if (!isNumeric(precision)) {
            return "toBeCloseTo expects a numeric digit count, got " + render(precision);
        }
        if (actual === expected) return null;
        const difference = mathAbs(actual - expected);
        return difference <= mathPow(10, -precision) / 2
            ? null
            : "Expected " + render(actual) + " to be close to " + render(expected)
                + " (" + precision + " digits), difference is " + render(difference);
    }"#
            }
            Matcher::ToBeGreaterThan => {
                r#"(actual, expected) => {
        if (!orderable(actual, expected)) {
            return "toBeGreaterThan cannot compare " + render(actual) + " with " + render(expected);
        }
        return actual > expected
            ? null
            : "Expected " + render(actual) + " to be greater than " + render(expected);
    }"#
            }
            Matcher::ToBeLessThan => {
                r#"(actual, expected) => {
        if (!orderable(actual, expected)) {
            return "toBeLessThan cannot compare " + render(actual) + " with " + render(expected);
        }
        return actual < expected
            ? null
            : "Expected " + render(actual) + " to be less than " + render(expected);
    }"#
            }
        }
    }
}

impl fmt::Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_names_are_unique() {
        let names: HashSet<_> = Matcher::ALL.iter().map(Matcher::name).collect();
        assert_eq!(names.len(), Matcher::ALL.len());
    }

    #[test]
    fn test_from_name() {
        for matcher in Matcher::ALL {
            assert_eq!(Matcher::from_name(matcher.name()), Some(matcher));
            assert!(matcher.signature().starts_with(matcher.name()));
        }
        assert_eq!(Matcher::from_name("toThrow"), None);
        assert_eq!(Matcher::from_name("tobe"), None);
    }

    #[test]
    fn test_checks_are_arrow_functions() {
        for matcher in Matcher::ALL {
            let js = matcher.check_js();
            assert!(js.starts_with('('), "{matcher} check is not an arrow function");
            assert!(js.contains("=>"));
        }
    }
}
