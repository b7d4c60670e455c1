//! Assertion & registration shim
//!
//! Evaluated before any caller text. Defines `describe`, `it`, `test` and
//! `expect` as script-scope bindings, a read-only `results` view, and the
//! `__testbox_collect` function the marshaller calls at the end.
//!
//! Records never leave the shim closure. Every builtin the shim relies on is
//! captured up front, so caller code that patches prototypes or `JSON`
//! cannot forge or corrupt the report.

use std::sync::OnceLock;

use crate::matchers::Matcher;

/// Script the marshaller evaluates to read the report
pub(crate) const COLLECT_CALL: &str = "__testbox_collect()";

const PRELUDE: &str = r#"const { describe, it, test, expect } = (() => {
    "use strict";

    const ErrorCtor = Error;
    const StringCtor = String;
    const WeakSetCtor = WeakSet;
    const MapCtor = Map;
    const SetCtor = Set;
    const DateCtor = Date;
    const RegExpCtor = RegExp;
    const JSONStringify = JSON.stringify;
    const ObjectKeys = Object.keys;
    const ObjectFreeze = Object.freeze;
    const ObjectDefineProperty = Object.defineProperty;
    const ObjectHasOwn = Object.prototype.hasOwnProperty;
    const ObjectToString = Object.prototype.toString;
    const ArrayIsArray = Array.isArray;
    const ArrayFrom = Array.from;
    const ReflectApply = Reflect.apply;
    const DateGetTime = Date.prototype.getTime;
    const isNaNValue = Number.isNaN;
    const mathAbs = Math.abs;
    const mathPow = Math.pow;
    const weakSetHas = WeakSet.prototype.has;
    const weakSetAdd = WeakSet.prototype.add;
    const stringToWellFormed = String.prototype.toWellFormed;
    const stringCharCodeAt = String.prototype.charCodeAt;
    const stringFromCharCode = String.fromCharCode;
    const unboxers = {
        __proto__: null,
        "[object Number]": Number.prototype.valueOf,
        "[object Boolean]": Boolean.prototype.valueOf,
        "[object String]": String.prototype.valueOf,
        "[object BigInt]": BigInt.prototype.valueOf,
        "[object Symbol]": Symbol.prototype.valueOf,
    };

    const UNPRINTABLE = "<unprintable value>";
    const records = [];

    const append = (list, value) => {
        ObjectDefineProperty(list, list.length, {
            value,
            writable: true,
            enumerable: true,
            configurable: true,
        });
    };

    const safeText = (value) => {
        try {
            return StringCtor(value);
        } catch (_) {
            return UNPRINTABLE;
        }
    };

    const messageOf = (error) => {
        try {
            if (error instanceof ErrorCtor) return StringCtor(error.message);
            return StringCtor(error);
        } catch (_) {
            return UNPRINTABLE;
        }
    };

    const tagOf = (value) => ReflectApply(ObjectToString, value, []);
    const hasOwn = (value, key) => ReflectApply(ObjectHasOwn, value, [key]);
    const isNumeric = (value) => typeof value === "number";
    const orderable = (a, b) => {
        const kind = typeof a;
        return kind === typeof b && (kind === "number" || kind === "bigint" || kind === "string");
    };

    const render = (value) => {
        switch (typeof value) {
            case "string":
                return JSONStringify(value);
            case "undefined":
                return "undefined";
            case "number":
                if (value !== value) return "NaN";
                if (value === 0 && 1 / value < 0) return "-0";
                return StringCtor(value);
            case "bigint":
                return StringCtor(value) + "n";
            case "function":
                return "[Function " + (safeText(value.name) || "anonymous") + "]";
            case "object":
                if (value === null) return "null";
                try {
                    const seen = new WeakSetCtor();
                    const text = JSONStringify(value, function (key, item) {
                        if (typeof item === "bigint") return StringCtor(item) + "n";
                        if (typeof item === "function") return "[Function " + (item.name || "anonymous") + "]";
                        if (item === undefined && key !== "") return "undefined";
                        if (typeof item === "number" && item !== item) return "NaN";
                        if (typeof item === "object" && item !== null) {
                            if (ReflectApply(weakSetHas, seen, [item])) return "[Circular]";
                            ReflectApply(weakSetAdd, seen, [item]);
                            if (item instanceof MapCtor) return { Map: ArrayFrom(item) };
                            if (item instanceof SetCtor) return { Set: ArrayFrom(item) };
                        }
                        return item;
                    });
                    return text === undefined ? safeText(value) : text;
                } catch (_) {
                    return safeText(value);
                }
            default:
                return safeText(value);
        }
    };

    const sameNumber = (a, b) => a === b || (a !== a && b !== b);

    // Lone surrogates become U+FFFD so the report is valid UTF-8
    const wellFormed = (text) => {
        if (typeof stringToWellFormed === "function") return ReflectApply(stringToWellFormed, text, []);
        let out = "";
        for (let i = 0; i < text.length; i++) {
            const unit = ReflectApply(stringCharCodeAt, text, [i]);
            if (unit >= 0xd800 && unit <= 0xdbff) {
                const next = ReflectApply(stringCharCodeAt, text, [i + 1]);
                if (next >= 0xdc00 && next <= 0xdfff) {
                    out += stringFromCharCode(unit, next);
                    i += 1;
                    continue;
                }
                out += "\uFFFD";
            } else if (unit >= 0xdc00 && unit <= 0xdfff) {
                out += "\uFFFD";
            } else {
                out += stringFromCharCode(unit);
            }
        }
        return out;
    };

    const deepEqual = (a, b, stack) => {
        if (a === b) return true;
        if (isNaNValue(a) && isNaNValue(b)) return true;
        if (typeof a !== "object" || typeof b !== "object" || a === null || b === null) {
            return false;
        }
        if (ArrayIsArray(a) !== ArrayIsArray(b)) return false;
        if (tagOf(a) !== tagOf(b)) return false;

        for (let i = 0; i < stack.length; i += 2) {
            if (stack[i] === a && stack[i + 1] === b) return true;
        }
        append(stack, a);
        append(stack, b);
        const equal = compareObjects(a, b, stack);
        stack.length -= 2;
        return equal;
    };

    const containsDeep = (list, item, stack) => {
        for (let i = 0; i < list.length; i++) {
            if (deepEqual(list[i], item, stack)) return true;
        }
        return false;
    };

    const compareObjects = (a, b, stack) => {
        if (ArrayIsArray(a)) {
            if (a.length !== b.length) return false;
            for (let i = 0; i < a.length; i++) {
                if (!deepEqual(a[i], b[i], stack)) return false;
            }
            return true;
        }
        if (a instanceof DateCtor && b instanceof DateCtor) {
            return sameNumber(ReflectApply(DateGetTime, a, []), ReflectApply(DateGetTime, b, []));
        }
        if (a instanceof RegExpCtor && b instanceof RegExpCtor) {
            return a.source === b.source && a.flags === b.flags;
        }
        const unbox = unboxers[tagOf(a)];
        if (unbox !== undefined) {
            try {
                if (!sameNumber(ReflectApply(unbox, a, []), ReflectApply(unbox, b, []))) return false;
            } catch (_) {
                return false;
            }
        }
        if ((a instanceof MapCtor && b instanceof MapCtor) || (a instanceof SetCtor && b instanceof SetCtor)) {
            if (a.size !== b.size) return false;
            const left = ArrayFrom(a);
            const right = ArrayFrom(b);
            for (let i = 0; i < left.length; i++) {
                if (!containsDeep(right, left[i], stack)) return false;
            }
            return true;
        }
        if (a instanceof ErrorCtor && b instanceof ErrorCtor) {
            if (a.name !== b.name || a.message !== b.message) return false;
        }

        const keysA = ObjectKeys(a);
        const keysB = ObjectKeys(b);
        let definedA = 0;
        for (let i = 0; i < keysA.length; i++) {
            const key = keysA[i];
            if (a[key] === undefined) continue;
            definedA += 1;
            if (!hasOwn(b, key) || b[key] === undefined) return false;
            if (!deepEqual(a[key], b[key], stack)) return false;
        }
        let definedB = 0;
        for (let i = 0; i < keysB.length; i++) {
            if (b[keysB[i]] !== undefined) definedB += 1;
        }
        return definedA === definedB;
    };

    class AssertionError extends ErrorCtor {
        constructor(message) {
            super(message);
            this.name = "AssertionError";
        }
    }

    const checks = {
        __proto__: null,
"#;

const EPILOGUE: &str = r#"    };
    const matcherNames = ObjectKeys(checks);

    const expect = (actual) => {
        const matcher = { __proto__: null };
        for (let i = 0; i < matcherNames.length; i++) {
            const check = checks[matcherNames[i]];
            matcher[matcherNames[i]] = (expected, option) => {
                const failure = check(actual, expected, option);
                if (failure !== null) throw new AssertionError(failure);
            };
        }
        return ObjectFreeze(matcher);
    };

    const describe = (name, body) => {
        body();
    };

    const it = (name, body) => {
        const label = safeText(name);
        let record;
        try {
            body();
            record = ObjectFreeze({ __proto__: null, name: label, status: "passed" });
        } catch (error) {
            record = ObjectFreeze({ __proto__: null, name: label, status: "failed", error: messageOf(error) });
        }
        append(records, record);
    };

    const snapshot = () => {
        const copy = [];
        for (let i = 0; i < records.length; i++) append(copy, records[i]);
        return copy;
    };

    const collect = () => {
        let out = "[";
        for (let i = 0; i < records.length; i++) {
            const record = records[i];
            if (i > 0) out += ",";
            out += "{\"name\":" + JSONStringify(wellFormed(record.name)) + ",\"status\":" + JSONStringify(record.status);
            if (record.status === "failed") out += ",\"error\":" + JSONStringify(wellFormed(record.error));
            out += "}";
        }
        return out + "]";
    };

    ObjectDefineProperty(globalThis, "results", {
        get: snapshot,
        enumerable: false,
        configurable: false,
    });
    ObjectDefineProperty(globalThis, "__testbox_collect", {
        value: collect,
        writable: false,
        enumerable: false,
        configurable: false,
    });
    globalThis.global = globalThis;

    return ObjectFreeze({ describe, it, test: it, expect });
})();
"#;

/// Full shim text, generated once from [`Matcher::ALL`]
pub fn source() -> &'static str {
    static SOURCE: OnceLock<String> = OnceLock::new();
    SOURCE.get_or_init(build)
}

fn build() -> String {
    let mut out = String::with_capacity(PRELUDE.len() + EPILOGUE.len() + 4096);
    out.push_str(PRELUDE);
    for matcher in Matcher::ALL {
        out.push_str("        ");
        out.push_str(matcher.name());
        out.push_str(": ");
        out.push_str(matcher.check_js());
        out.push_str(",\n");
    }
    out.push_str(EPILOGUE);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use testbox_sandbox::{GlobalSurface, Sandbox, SandboxLimits, V8Sandbox};

    fn sandbox() -> V8Sandbox {
        let mut sandbox = V8Sandbox::new(&SandboxLimits::default(), &GlobalSurface::locked_down()).unwrap();
        sandbox.eval("[test:shim]", source()).unwrap();
        sandbox
    }

    fn eval_string(sandbox: &mut V8Sandbox, code: &str) -> String {
        sandbox.eval_string("[test]", code).unwrap()
    }

    #[test]
    fn test_source_lists_every_matcher() {
        let src = source();
        for matcher in Matcher::ALL {
            assert!(src.contains(&format!("        {}: (", matcher.name())));
        }
        assert!(std::ptr::eq(source(), source()));
    }

    #[test]
    fn test_expect_exposes_exactly_the_matcher_set() {
        let mut sb = sandbox();
        let names = eval_string(&mut sb, "Object.keys(expect(1)).join(',')");
        let expected: Vec<_> = Matcher::ALL.iter().map(Matcher::name).collect();
        assert_eq!(names, expected.join(","));
    }

    #[test]
    fn test_registration_records_in_order() {
        let mut sb = sandbox();
        sb.eval(
            "[test]",
            r#"
            describe("group", () => {
                it("first", () => expect(1).toBe(1));
                test("second", () => { throw new Error("nope"); });
                it("third", () => {});
            });
            "#,
        )
        .unwrap();
        let payload = eval_string(&mut sb, COLLECT_CALL);
        assert_eq!(
            payload,
            r#"[{"name":"first","status":"passed"},{"name":"second","status":"failed","error":"nope"},{"name":"third","status":"passed"}]"#
        );
    }

    #[test]
    fn test_non_error_throws_still_carry_a_message() {
        let mut sb = sandbox();
        sb.eval(
            "[test]",
            r#"
            it("string", () => { throw "plain text"; });
            it("undefined", () => { throw undefined; });
            it("hostile", () => { throw { toString() { throw new Error("no"); } }; });
            "#,
        )
        .unwrap();
        let payload = eval_string(&mut sb, COLLECT_CALL);
        assert!(payload.contains(r#""error":"plain text""#));
        assert!(payload.contains(r#""error":"undefined""#));
        assert!(payload.contains(r#""error":"<unprintable value>""#));
    }

    #[test]
    fn test_results_view_cannot_forge_records() {
        let mut sb = sandbox();
        sb.eval(
            "[test]",
            r#"
            it("real", () => {});
            results.push({ name: "fake", status: "passed" });
            try { results = []; } catch (_) {}
            JSON.stringify = () => "[]";
            Array.prototype.push = () => 0;
            "#,
        )
        .unwrap();
        assert_eq!(eval_string(&mut sb, "String(results.length)"), "1");
        assert_eq!(
            eval_string(&mut sb, COLLECT_CALL),
            r#"[{"name":"real","status":"passed"}]"#
        );
    }

    #[test]
    fn test_collector_cannot_be_replaced() {
        let mut sb = sandbox();
        sb.eval(
            "[test]",
            r#"try { globalThis.__testbox_collect = () => "[]"; } catch (_) {}
            it("kept", () => {});"#,
        )
        .unwrap();
        assert!(sb.eval("[test]", "let __testbox_collect = () => '[]';").is_err());
        assert_eq!(
            eval_string(&mut sb, COLLECT_CALL),
            r#"[{"name":"kept","status":"passed"}]"#
        );
    }

    #[test]
    fn test_describe_body_throw_propagates() {
        let mut sb = sandbox();
        let err = sb
            .eval("[test]", r#"describe("d", () => { throw new Error("outside a test"); });"#)
            .unwrap_err();
        assert_eq!(err.to_string(), "Error: outside a test");
    }

    #[test]
    fn test_failure_messages_render_values() {
        let mut sb = sandbox();
        sb.eval(
            "[test]",
            r#"
            it("string", () => expect("1").toBe(1));
            it("negative zero", () => expect(-0).toBeNaN());
            it("function", () => expect(function named() {}).toBeFalsy());
            it("cycle", () => { const o = { a: 1 }; o.self = o; expect(o).toBeNull(); });
            "#,
        )
        .unwrap();
        let payload = eval_string(&mut sb, COLLECT_CALL);
        assert!(payload.contains(r#"Expected 1 but got \"1\""#), "{payload}");
        assert!(payload.contains("Expected -0 to be NaN"), "{payload}");
        assert!(payload.contains("Expected [Function named] to be falsy"), "{payload}");
        assert!(payload.contains(r#"[Circular]"#), "{payload}");
    }
}
