/// An entry in the error code registry.
pub struct ErrorEntry {
    pub code: &'static str,
    pub short: &'static str, // brief description for `ok explain --list`
    pub long: &'static str,  // full explanation for `ok explain`
}

/// All stable error codes reported by the `ok` tool.
pub static REGISTRY: &[ErrorEntry] = &[
    // ── Loading ──────────────────────────────────────────────────────────────
    ErrorEntry {
        code: "OK-L001",
        short: "program file cannot be read",
        long: r#"## OK-L001: program file cannot be read

The program given to `ok run` or `ok dump` must be a JSON document holding
a parsed unit: an object with a `funcs` array and an optional `interfaces`
table. The file could not be opened, or its contents did not match that
shape.

**Minimal program:**

    {"funcs": [{"name": "main", "statements": []}]}
"#,
    },
    // ── Compiler ─────────────────────────────────────────────────────────────
    ErrorEntry {
        code: "OK-C001",
        short: "invalid binary operation",
        long: r#"## OK-C001: invalid binary operation

Binary operators need both operands to have the same primitive kind, and
the operator must be defined for that kind.

**Example:**

    x = 1 + "a"

`+` is defined on two numbers or two strings, never on a mix. Convert one
side first:

    x = string(1) + "a"
"#,
    },
    ErrorEntry {
        code: "OK-C002",
        short: "invalid unary operation",
        long: r#"## OK-C002: invalid unary operation

`not` applies to bools. Negation applies to numbers. `++` and `--` apply
to number variables only.

**Example:**

    x = not 3
"#,
    },
    ErrorEntry {
        code: "OK-C003",
        short: "variable assigned a value of another kind",
        long: r#"## OK-C003: variable assigned a value of another kind

A variable keeps the kind of its first assignment. Compound assignments
such as `+=` follow the same rule.

**Example:**

    x = 1
    x = "one"

Use a new variable, or convert the value with `number()`.
"#,
    },
    ErrorEntry {
        code: "OK-C004",
        short: "element assigned a value of another kind",
        long: r#"## OK-C004: element assigned a value of another kind

Arrays and maps hold values of a single element kind.

**Example:**

    xs = [1, 2]
    xs[0] = "zero"
"#,
    },
    ErrorEntry {
        code: "OK-C005",
        short: "target cannot be assigned",
        long: r#"## OK-C005: target cannot be assigned

Only variables and elements (`xs[i]`, `m["k"]`) can appear on the left of
an assignment.
"#,
    },
    ErrorEntry {
        code: "OK-C006",
        short: "undefined variable",
        long: r#"## OK-C006: undefined variable

A variable was read before anything was assigned to it. `err` is only
bound inside an `on` handler.
"#,
    },
    ErrorEntry {
        code: "OK-C007",
        short: "no such function",
        long: r#"## OK-C007: no such function

The called name is not a function of the unit, a native function, a
builtin, or a variable holding a function.
"#,
    },
    ErrorEntry {
        code: "OK-C008",
        short: "no such method",
        long: r#"## OK-C008: no such method

`obj.Method()` looks up `Method` in the interface of the object's kind.
Only public (capitalised) function fields assigned in the constructor
are methods.
"#,
    },
    ErrorEntry {
        code: "OK-C009",
        short: "duplicate function",
        long: r#"## OK-C009: duplicate function

Two functions in the same unit have the same name.
"#,
    },
    ErrorEntry {
        code: "OK-C010",
        short: "wrong number of arguments",
        long: r#"## OK-C010: wrong number of arguments

A call passed a different number of arguments than the function declares.

**Example:**

    func add(a, b number) number { return a + b }
    add(1)
"#,
    },
    ErrorEntry {
        code: "OK-C011",
        short: "argument of the wrong kind",
        long: r#"## OK-C011: argument of the wrong kind

An argument does not match the declared parameter kind. Parameters of
kind `any` accept every value.
"#,
    },
    ErrorEntry {
        code: "OK-C012",
        short: "value count mismatch",
        long: r#"## OK-C012: value count mismatch

The number of values on the right of an assignment must match the number
of targets. A call contributes one value per declared return.

**Example:**

    a, b = 1
"#,
    },
    ErrorEntry {
        code: "OK-C013",
        short: "wrong return values",
        long: r#"## OK-C013: wrong return values

A `return` must produce exactly the kinds the function declares.
"#,
    },
    ErrorEntry {
        code: "OK-C014",
        short: "condition is not a bool",
        long: r#"## OK-C014: condition is not a bool

`if` and `for` conditions must be bool expressions. There is no implicit
truthiness.
"#,
    },
    ErrorEntry {
        code: "OK-C015",
        short: "value cannot be indexed",
        long: r#"## OK-C015: value cannot be indexed

Arrays are indexed by numbers and maps by strings. Other kinds cannot be
indexed.
"#,
    },
    ErrorEntry {
        code: "OK-C016",
        short: "value cannot be iterated",
        long: r#"## OK-C016: value cannot be iterated

`for x in expr` needs an array or a map.
"#,
    },
    ErrorEntry {
        code: "OK-C017",
        short: "malformed literal",
        long: r#"## OK-C017: malformed literal

A literal's text does not parse as its declared kind, for example a
number literal `1.2.3` or a char literal holding two characters.
"#,
    },
    ErrorEntry {
        code: "OK-C018",
        short: "empty literal without a kind",
        long: r#"## OK-C018: empty literal without a kind

The element kind of `[]` or `{}` cannot be inferred from nothing. Give the
literal an explicit kind such as `[]number{}`.
"#,
    },
    ErrorEntry {
        code: "OK-C019",
        short: "builtin argument of the wrong kind",
        long: r#"## OK-C019: builtin argument of the wrong kind

The reflection and maths builtins check their arguments while compiling.
`__pow` and `__log` take numbers, `__get` and `__set` take a map or object
and a string property name, `__props` takes a map or object, and `__call`
takes a function and an array of arguments. Values of kind `any` are checked
when the program runs instead.
"#,
    },
    // ── Runtime ──────────────────────────────────────────────────────────────
    ErrorEntry {
        code: "OK-R001",
        short: "division by zero",
        long: r#"## OK-R001: division by zero

`/` or `%` with a zero divisor raises `DivisionByZero`. It can be handled:

    try {
        x = 1 / 0
    } on DivisionByZero {
        print("nope")
    }
"#,
    },
    ErrorEntry {
        code: "OK-R002",
        short: "cast failed",
        long: r#"## OK-R002: cast failed

`number()` or `char()` received a value it cannot convert, raising
`CastError`.
"#,
    },
    ErrorEntry {
        code: "OK-R003",
        short: "arithmetic error",
        long: r#"## OK-R003: arithmetic error

A number operation overflowed or has no result, such as the logarithm
of a negative number. Raises `ArithmeticError`.
"#,
    },
    ErrorEntry {
        code: "OK-R004",
        short: "call failed",
        long: r#"## OK-R004: call failed

A dynamic call passed the wrong arguments, a function fell off its end
without returning its declared values, or calls nested too deeply.
Raises `CallError`.
"#,
    },
    ErrorEntry {
        code: "OK-R005",
        short: "property error",
        long: r#"## OK-R005: property error

`__get`, `__set` or a map read named a property or key the value does
not have, or `__set` gave a field a value of another kind. Raises
`PropertyError`.
"#,
    },
    ErrorEntry {
        code: "OK-R006",
        short: "index out of range",
        long: r#"## OK-R006: index out of range

An array index was negative, fractional, or past the end. Raises
`IndexError`.
"#,
    },
    ErrorEntry {
        code: "OK-R007",
        short: "undefined function at run time",
        long: r#"## OK-R007: undefined function at run time

The entry point, or a function value being called, names no compiled or
native function.
"#,
    },
    ErrorEntry {
        code: "OK-R008",
        short: "uncaught raised error",
        long: r#"## OK-R008: uncaught raised error

A value passed to `raise` was not handled by any `on` clause up the call
stack. The message shows the error's kind and its `Error` field.
"#,
    },
    ErrorEntry {
        code: "OK-R009",
        short: "internal virtual machine error",
        long: r#"## OK-R009: internal virtual machine error

The machine met an instruction it could not carry out: a register was
read before being written, an operand had the wrong kind, or output could
not be written. Programs that compiled cleanly should never see this.

If you see this, please file a bug report.
"#,
    },
];

/// Look up an error entry by code (e.g. `"OK-C003"`).
pub fn lookup(code: &str) -> Option<&'static ErrorEntry> {
    REGISTRY.iter().find(|e| e.code == code)
}
