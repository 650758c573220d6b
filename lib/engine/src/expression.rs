//! Scalar expression evaluation against a single solution.

use crate::error::ExpressionError;
use rdf_quarry_algebra::{Expression, Function};
use rdf_quarry_model::{vocab, Literal, NamedNode, Solution, Term};
use std::cmp::Ordering;

/// Evaluates an expression to a term. Unbound variables, type violations,
/// and incompatible literal pairs all surface as errors; it is the caller's
/// decision whether an error means "drop the solution" (Filter) or "fail the
/// query" (Extend).
pub fn evaluate(expression: &Expression, solution: &Solution) -> Result<Term, ExpressionError> {
    match expression {
        Expression::NamedNode(n) => Ok(n.clone().into()),
        Expression::Literal(l) => Ok(l.clone().into()),
        Expression::Variable(v) => solution
            .get(v)
            .cloned()
            .ok_or_else(|| ExpressionError::UnboundVariable(v.clone())),
        Expression::Bound(v) => Ok(boolean_literal(solution.contains(v))),
        Expression::Or(a, b) => {
            // A true side wins even when the other side errors.
            match (boolean(a, solution), boolean(b, solution)) {
                (Ok(true), _) | (_, Ok(true)) => Ok(boolean_literal(true)),
                (Ok(false), Ok(false)) => Ok(boolean_literal(false)),
                (Err(e), _) | (_, Err(e)) => Err(e),
            }
        }
        Expression::And(a, b) => match (boolean(a, solution), boolean(b, solution)) {
            (Ok(false), _) | (_, Ok(false)) => Ok(boolean_literal(false)),
            (Ok(true), Ok(true)) => Ok(boolean_literal(true)),
            (Err(e), _) | (_, Err(e)) => Err(e),
        },
        Expression::Not(inner) => Ok(boolean_literal(!boolean(inner, solution)?)),
        Expression::Equal(a, b) => {
            let a = evaluate(a, solution)?;
            let b = evaluate(b, solution)?;
            Ok(boolean_literal(equals(&a, &b)?))
        }
        Expression::SameTerm(a, b) => {
            Ok(boolean_literal(evaluate(a, solution)? == evaluate(b, solution)?))
        }
        Expression::Greater(a, b) => comparison(a, b, solution, Ordering::is_gt),
        Expression::GreaterOrEqual(a, b) => comparison(a, b, solution, Ordering::is_ge),
        Expression::Less(a, b) => comparison(a, b, solution, Ordering::is_lt),
        Expression::LessOrEqual(a, b) => comparison(a, b, solution, Ordering::is_le),
        Expression::Add(a, b) => arithmetic(a, b, solution, Numeric::add),
        Expression::Subtract(a, b) => arithmetic(a, b, solution, Numeric::subtract),
        Expression::Multiply(a, b) => arithmetic(a, b, solution, Numeric::multiply),
        Expression::Divide(a, b) => {
            let a = numeric_operand(&evaluate(a, solution)?)?;
            let b = numeric_operand(&evaluate(b, solution)?)?;
            if b.as_f64() == 0.0 {
                return Err(ExpressionError::DivisionByZero);
            }
            Ok(Numeric::Double(a.as_f64() / b.as_f64()).into_term())
        }
        Expression::UnaryMinus(inner) => {
            let n = numeric_operand(&evaluate(inner, solution)?)?;
            Ok(match n {
                Numeric::Integer(i) => Numeric::Integer(-i),
                Numeric::Double(d) => Numeric::Double(-d),
            }
            .into_term())
        }
        Expression::FunctionCall(function, args) => {
            let args = args
                .iter()
                .map(|a| evaluate(a, solution))
                .collect::<Result<Vec<_>, _>>()?;
            evaluate_function(*function, &args)
        }
    }
}

/// Evaluates an expression and reduces the result to its effective boolean
/// value.
pub fn boolean(expression: &Expression, solution: &Solution) -> Result<bool, ExpressionError> {
    effective_boolean_value(&evaluate(expression, solution)?)
}

/// The SPARQL effective boolean value: booleans are themselves, numerics are
/// "nonzero", strings are "nonempty", anything else has none.
pub fn effective_boolean_value(term: &Term) -> Result<bool, ExpressionError> {
    let error = || ExpressionError::NoEffectiveBooleanValue(term.clone());
    let Term::Literal(literal) = term else {
        return Err(error());
    };
    match literal.datatype() {
        Some(dt) if dt.as_str() == vocab::xsd::BOOLEAN => match literal.value() {
            "true" | "1" => Ok(true),
            "false" | "0" => Ok(false),
            _ => Err(error()),
        },
        Some(dt) if is_numeric_datatype(dt.as_str()) => numeric_value(literal)
            .map(|n| n.as_f64() != 0.0)
            .ok_or_else(error),
        Some(dt) if dt.as_str() == vocab::xsd::STRING => Ok(!literal.value().is_empty()),
        Some(_) => Err(error()),
        None => Ok(!literal.value().is_empty()),
    }
}

fn comparison(
    a: &Expression,
    b: &Expression,
    solution: &Solution,
    check: fn(Ordering) -> bool,
) -> Result<Term, ExpressionError> {
    let a = evaluate(a, solution)?;
    let b = evaluate(b, solution)?;
    Ok(boolean_literal(check(compare(&a, &b)?)))
}

fn arithmetic(
    a: &Expression,
    b: &Expression,
    solution: &Solution,
    op: fn(Numeric, Numeric) -> Numeric,
) -> Result<Term, ExpressionError> {
    let a = numeric_operand(&evaluate(a, solution)?)?;
    let b = numeric_operand(&evaluate(b, solution)?)?;
    Ok(op(a, b).into_term())
}

/// Value equality: numeric comparison for numeric literals, term equality
/// otherwise. Unequal literals of an unrecognized datatype are incomparable
/// rather than unequal.
fn equals(a: &Term, b: &Term) -> Result<bool, ExpressionError> {
    if a == b {
        return Ok(true);
    }
    match (a, b) {
        (Term::Literal(la), Term::Literal(lb)) => {
            if let (Some(x), Some(y)) = (numeric_value(la), numeric_value(lb)) {
                return Ok(x.as_f64() == y.as_f64());
            }
            if has_comparable_form(la) && has_comparable_form(lb) {
                Ok(false)
            } else {
                Err(ExpressionError::Incomparable(a.clone(), b.clone()))
            }
        }
        _ => Ok(false),
    }
}

fn compare(a: &Term, b: &Term) -> Result<Ordering, ExpressionError> {
    let incomparable = || ExpressionError::Incomparable(a.clone(), b.clone());
    let (Term::Literal(la), Term::Literal(lb)) = (a, b) else {
        return Err(incomparable());
    };
    if let (Some(x), Some(y)) = (numeric_value(la), numeric_value(lb)) {
        return x.as_f64().partial_cmp(&y.as_f64()).ok_or_else(incomparable);
    }
    let stringish = |l: &Literal| l.language().is_none() && (l.datatype().is_none() || l.is_string_typed());
    if stringish(la) && stringish(lb) {
        return Ok(la.value().cmp(lb.value()));
    }
    Err(incomparable())
}

fn has_comparable_form(literal: &Literal) -> bool {
    match literal.datatype() {
        None => true,
        Some(dt) => {
            let dt = dt.as_str();
            dt == vocab::xsd::STRING || dt == vocab::xsd::BOOLEAN || is_numeric_datatype(dt)
        }
    }
}

fn evaluate_function(function: Function, args: &[Term]) -> Result<Term, ExpressionError> {
    let name = function.name();
    match (function, args) {
        (Function::Str, [term]) => match term {
            Term::NamedNode(n) => Ok(Literal::new(n.as_str()).into()),
            Term::Literal(l) => Ok(Literal::new(l.value()).into()),
            Term::BlankNode(_) => Err(ExpressionError::InvalidArgument {
                function: name,
                term: term.clone(),
            }),
        },
        (Function::Lang, [term]) => {
            let literal = literal_argument(name, term)?;
            Ok(Literal::new(literal.language().unwrap_or_default()).into())
        }
        (Function::LangMatches, [lang, range]) => {
            let lang = string_argument(name, lang)?.value().to_ascii_lowercase();
            let range = string_argument(name, range)?.value().to_ascii_lowercase();
            let matches = if range == "*" {
                !lang.is_empty()
            } else {
                lang == range || lang.starts_with(&format!("{range}-"))
            };
            Ok(boolean_literal(matches))
        }
        (Function::Datatype, [term]) => {
            let literal = literal_argument(name, term)?;
            match (literal.datatype(), literal.language()) {
                (Some(dt), _) => Ok(dt.clone().into()),
                (None, None) => Ok(NamedNode::new(vocab::xsd::STRING).into()),
                (None, Some(_)) => Err(ExpressionError::InvalidArgument {
                    function: name,
                    term: term.clone(),
                }),
            }
        }
        (Function::Contains, [a, b]) => {
            let (a, b) = string_pair(name, a, b)?;
            Ok(boolean_literal(a.value().contains(b.value())))
        }
        (Function::StrStarts, [a, b]) => {
            let (a, b) = string_pair(name, a, b)?;
            Ok(boolean_literal(a.value().starts_with(b.value())))
        }
        (Function::StrEnds, [a, b]) => {
            let (a, b) = string_pair(name, a, b)?;
            Ok(boolean_literal(a.value().ends_with(b.value())))
        }
        (Function::Concat, args) => concat(name, args),
        (Function::SubStr, [input, start]) => substr(name, input, start, None),
        (Function::SubStr, [input, start, length]) => substr(name, input, start, Some(length)),
        (Function::StrLen, [term]) => {
            let literal = string_argument(name, term)?;
            let length = literal.value().chars().count();
            Ok(Literal::new_typed(length.to_string(), NamedNode::new(vocab::xsd::INTEGER)).into())
        }
        (Function::UCase, [term]) => {
            let literal = string_argument(name, term)?;
            Ok(preserving(literal, literal.value().to_uppercase()).into())
        }
        (Function::LCase, [term]) => {
            let literal = string_argument(name, term)?;
            Ok(preserving(literal, literal.value().to_lowercase()).into())
        }
        (Function::IsIri, [term]) => Ok(boolean_literal(matches!(term, Term::NamedNode(_)))),
        (Function::IsBlank, [term]) => Ok(boolean_literal(matches!(term, Term::BlankNode(_)))),
        (Function::IsLiteral, [term]) => Ok(boolean_literal(term.is_literal())),
        _ => Err(ExpressionError::WrongArity { function: name }),
    }
}

/// CONCAT with its result-form rules: all arguments `xsd:string`-typed gives
/// a string-typed result, all sharing one language tag gives a tagged
/// result, anything else gives a plain literal.
fn concat(name: &'static str, args: &[Term]) -> Result<Term, ExpressionError> {
    let mut value = String::new();
    let mut all_string = !args.is_empty();
    let mut shared_language: Option<Option<&str>> = None;
    for term in args {
        let literal = string_argument(name, term)?;
        value.push_str(literal.value());
        all_string &= literal.is_string_typed();
        match &shared_language {
            None => shared_language = Some(literal.language()),
            Some(tag) if *tag == literal.language() => {}
            Some(_) => shared_language = Some(None),
        }
    }
    Ok(if all_string {
        Literal::new_typed(value, NamedNode::new(vocab::xsd::STRING))
    } else if let Some(Some(tag)) = shared_language {
        Literal::new_language_tagged(value, tag)
    } else {
        Literal::new(value)
    }
    .into())
}

/// SUBSTR with 1-based indexing and clamping; the result keeps the input's
/// datatype or language tag.
fn substr(
    name: &'static str,
    input: &Term,
    start: &Term,
    length: Option<&Term>,
) -> Result<Term, ExpressionError> {
    let input = string_argument(name, input)?;
    let start = integer_argument(name, start)?;
    let length = length.map(|l| integer_argument(name, l)).transpose()?;

    let chars: Vec<char> = input.value().chars().collect();
    let len = chars.len() as i64;
    let from = start.max(1) - 1;
    let value: String = if from >= len || length.is_some_and(|l| l < 1) {
        String::new()
    } else {
        let to = match length {
            Some(l) => (from + l).min(len),
            None => len,
        };
        chars[from as usize..to as usize].iter().collect()
    };
    Ok(preserving(input, value).into())
}

fn literal_argument<'a>(
    function: &'static str,
    term: &'a Term,
) -> Result<&'a Literal, ExpressionError> {
    term.as_literal()
        .ok_or_else(|| ExpressionError::NonLiteralArgument {
            function,
            term: term.clone(),
        })
}

/// A literal usable as a string argument: plain, language-tagged, or typed
/// as `xsd:string`. Any other datatype is rejected.
fn string_argument<'a>(
    function: &'static str,
    term: &'a Term,
) -> Result<&'a Literal, ExpressionError> {
    let literal = literal_argument(function, term)?;
    match literal.datatype() {
        Some(dt) if dt.as_str() != vocab::xsd::STRING => Err(ExpressionError::InvalidArgument {
            function,
            term: term.clone(),
        }),
        _ => Ok(literal),
    }
}

/// Applies the binary string-function compatibility rules to the two
/// arguments.
fn string_pair<'a>(
    function: &'static str,
    a: &'a Term,
    b: &'a Term,
) -> Result<(&'a Literal, &'a Literal), ExpressionError> {
    let a = string_argument(function, a)?;
    let b = string_argument(function, b)?;
    let compatible = if a.is_string_typed() {
        b.is_string_typed() || b.is_plain()
    } else if let Some(tag) = a.language() {
        b.is_string_typed() || b.language().map_or(true, |l| l == tag)
    } else {
        b.is_string_typed() || b.language().is_none()
    };
    if compatible {
        Ok((a, b))
    } else {
        Err(ExpressionError::InvalidArgumentPair { function })
    }
}

fn integer_argument(function: &'static str, term: &Term) -> Result<i64, ExpressionError> {
    let literal = literal_argument(function, term)?;
    let numeric = literal
        .datatype()
        .is_some_and(|dt| is_numeric_datatype(dt.as_str()));
    if !numeric {
        return Err(ExpressionError::NonNumericArgument { function });
    }
    match numeric_value(literal) {
        Some(Numeric::Integer(i)) => Ok(i),
        Some(Numeric::Double(d)) if d.fract() == 0.0 => Ok(d as i64),
        _ => Err(ExpressionError::NonNumericArgument { function }),
    }
}

/// A new literal with the given value and the input's datatype or language.
fn preserving(input: &Literal, value: String) -> Literal {
    if let Some(language) = input.language() {
        Literal::new_language_tagged(value, language)
    } else if let Some(datatype) = input.datatype() {
        Literal::new_typed(value, datatype.clone())
    } else {
        Literal::new(value)
    }
}

fn boolean_literal(value: bool) -> Term {
    Literal::new_typed(value.to_string(), NamedNode::new(vocab::xsd::BOOLEAN)).into()
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Numeric {
    Integer(i64),
    Double(f64),
}

impl Numeric {
    fn as_f64(self) -> f64 {
        match self {
            Self::Integer(i) => i as f64,
            Self::Double(d) => d,
        }
    }

    fn add(self, other: Self) -> Self {
        self.combine(other, i64::checked_add, |x, y| x + y)
    }

    fn subtract(self, other: Self) -> Self {
        self.combine(other, i64::checked_sub, |x, y| x - y)
    }

    fn multiply(self, other: Self) -> Self {
        self.combine(other, i64::checked_mul, |x, y| x * y)
    }

    /// Integer pairs stay integers unless the operation overflows, in which
    /// case the result widens to a double.
    fn combine(
        self,
        other: Self,
        int_op: fn(i64, i64) -> Option<i64>,
        float_op: fn(f64, f64) -> f64,
    ) -> Self {
        match (self, other) {
            (Self::Integer(x), Self::Integer(y)) => int_op(x, y)
                .map(Self::Integer)
                .unwrap_or_else(|| Self::Double(float_op(x as f64, y as f64))),
            (x, y) => Self::Double(float_op(x.as_f64(), y.as_f64())),
        }
    }

    fn into_term(self) -> Term {
        match self {
            Self::Integer(i) => {
                Literal::new_typed(i.to_string(), NamedNode::new(vocab::xsd::INTEGER))
            }
            Self::Double(d) => {
                Literal::new_typed(d.to_string(), NamedNode::new(vocab::xsd::DOUBLE))
            }
        }
        .into()
    }
}

fn numeric_value(literal: &Literal) -> Option<Numeric> {
    let datatype = literal.datatype()?.as_str();
    let value = literal.value().trim();
    if is_integer_datatype(datatype) {
        value.parse().ok().map(Numeric::Integer)
    } else if is_numeric_datatype(datatype) {
        value.parse().ok().map(Numeric::Double)
    } else {
        None
    }
}

fn is_integer_datatype(datatype: &str) -> bool {
    matches!(
        datatype,
        vocab::xsd::INTEGER | vocab::xsd::INT | vocab::xsd::LONG | vocab::xsd::SHORT | vocab::xsd::BYTE
    )
}

fn is_numeric_datatype(datatype: &str) -> bool {
    is_integer_datatype(datatype)
        || matches!(
            datatype,
            vocab::xsd::DECIMAL | vocab::xsd::DOUBLE | vocab::xsd::FLOAT
        )
}

fn numeric_operand(term: &Term) -> Result<Numeric, ExpressionError> {
    term.as_literal()
        .and_then(numeric_value)
        .ok_or(ExpressionError::NonNumericOperand)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rdf_quarry_model::Variable;

    fn plain(value: &str) -> Term {
        Literal::new(value).into()
    }

    fn tagged(value: &str, lang: &str) -> Term {
        Literal::new_language_tagged(value, lang).into()
    }

    fn string(value: &str) -> Term {
        Literal::new_typed(value, NamedNode::new(vocab::xsd::STRING)).into()
    }

    fn integer(value: i64) -> Term {
        Literal::new_typed(value.to_string(), NamedNode::new(vocab::xsd::INTEGER)).into()
    }

    fn contains(a: Term, b: Term) -> Result<Term, ExpressionError> {
        evaluate_function(Function::Contains, &[a, b])
    }

    fn is_true(result: Result<Term, ExpressionError>) -> bool {
        effective_boolean_value(&result.unwrap()).unwrap()
    }

    #[test]
    fn string_pair_decision_table() {
        // typed first
        assert!(is_true(contains(string("foo"), string("o"))));
        assert!(is_true(contains(string("foo"), plain("o"))));
        assert!(contains(string("foo"), tagged("o", "en")).is_err());
        // tagged first
        assert!(is_true(contains(tagged("foo", "en"), string("o"))));
        assert!(is_true(contains(tagged("foo", "en"), plain("o"))));
        assert!(is_true(contains(tagged("foo", "en"), tagged("o", "en"))));
        assert!(contains(tagged("foo", "en"), tagged("o", "fr")).is_err());
        // plain first
        assert!(is_true(contains(plain("foo"), string("o"))));
        assert!(is_true(contains(plain("foo"), plain("o"))));
        assert!(contains(plain("foo"), tagged("o", "en")).is_err());
    }

    #[test]
    fn non_string_typed_arguments_are_rejected() {
        assert!(contains(integer(42), plain("4")).is_err());
        assert!(contains(plain("foo"), integer(4)).is_err());
        assert!(contains(Term::from(NamedNode::new("http://example.org/")), plain("e")).is_err());
    }

    #[test]
    fn concat_result_forms() {
        let all_string = evaluate_function(Function::Concat, &[string("a"), string("b")]).unwrap();
        assert_eq!(
            all_string.as_literal().unwrap(),
            &Literal::new_typed("ab", NamedNode::new(vocab::xsd::STRING))
        );

        let shared_tag =
            evaluate_function(Function::Concat, &[tagged("a", "en"), tagged("b", "en")]).unwrap();
        assert_eq!(
            shared_tag.as_literal().unwrap(),
            &Literal::new_language_tagged("ab", "en")
        );

        let mixed_tags =
            evaluate_function(Function::Concat, &[tagged("a", "en"), tagged("b", "fr")]).unwrap();
        assert_eq!(mixed_tags.as_literal().unwrap(), &Literal::new("ab"));

        let mixed_kinds =
            evaluate_function(Function::Concat, &[string("a"), plain("b")]).unwrap();
        assert_eq!(mixed_kinds.as_literal().unwrap(), &Literal::new("ab"));

        assert!(evaluate_function(Function::Concat, &[string("a"), integer(1)]).is_err());
    }

    #[test]
    fn substr_is_one_based_and_clamping() {
        let substr = |value: Term, args: &[Term]| {
            let mut all = vec![value];
            all.extend_from_slice(args);
            evaluate_function(Function::SubStr, &all)
                .unwrap()
                .as_literal()
                .unwrap()
                .value()
                .to_owned()
        };
        assert_eq!(substr(plain("hello"), &[integer(2)]), "ello");
        assert_eq!(substr(plain("hello"), &[integer(2), integer(3)]), "ell");
        assert_eq!(substr(plain("hello"), &[integer(-5)]), "hello");
        assert_eq!(substr(plain("hello"), &[integer(100)]), "");
        assert_eq!(substr(plain("hello"), &[integer(1), integer(0)]), "");
        assert_eq!(substr(plain("hello"), &[integer(4), integer(10)]), "lo");
    }

    #[test]
    fn substr_preserves_language_and_datatype() {
        let tagged_result =
            evaluate_function(Function::SubStr, &[tagged("hello", "en"), integer(2)]).unwrap();
        assert_eq!(
            tagged_result.as_literal().unwrap(),
            &Literal::new_language_tagged("ello", "en")
        );
        let typed_result =
            evaluate_function(Function::SubStr, &[string("hello"), integer(100)]).unwrap();
        assert_eq!(
            typed_result.as_literal().unwrap(),
            &Literal::new_typed("", NamedNode::new(vocab::xsd::STRING))
        );
    }

    #[test]
    fn substr_rejects_non_numeric_indexes() {
        assert!(evaluate_function(Function::SubStr, &[plain("hello"), plain("2")]).is_err());
        assert!(matches!(
            evaluate_function(Function::SubStr, &[plain("hello"), string("2")]),
            Err(ExpressionError::NonNumericArgument { .. })
        ));
    }

    #[test]
    fn case_functions_preserve_the_literal_form() {
        let result = evaluate_function(Function::UCase, &[tagged("chat", "fr")]).unwrap();
        assert_eq!(
            result.as_literal().unwrap(),
            &Literal::new_language_tagged("CHAT", "fr")
        );
        let result = evaluate_function(Function::LCase, &[string("ABC")]).unwrap();
        assert_eq!(
            result.as_literal().unwrap(),
            &Literal::new_typed("abc", NamedNode::new(vocab::xsd::STRING))
        );
    }

    #[test]
    fn strlen_counts_characters() {
        let result = evaluate_function(Function::StrLen, &[plain("héllo")]).unwrap();
        assert_eq!(result, integer(5));
    }

    #[test]
    fn lang_matches_ranges() {
        let lm = |lang: &str, range: &str| {
            is_true(evaluate_function(
                Function::LangMatches,
                &[plain(lang), plain(range)],
            ))
        };
        assert!(lm("en", "en"));
        assert!(lm("en-GB", "en"));
        assert!(lm("en", "*"));
        assert!(!lm("", "*"));
        assert!(!lm("fr", "en"));
    }

    #[test]
    fn numeric_equality_crosses_datatypes() {
        let decimal: Term =
            Literal::new_typed("4.0", NamedNode::new(vocab::xsd::DECIMAL)).into();
        assert!(equals(&integer(4), &decimal).unwrap());
        assert!(!equals(&integer(4), &integer(5)).unwrap());
    }

    #[test]
    fn unknown_typed_literal_pairs_are_incomparable() {
        let custom = |v: &str| {
            Term::from(Literal::new_typed(
                v,
                NamedNode::new("http://example.org/custom"),
            ))
        };
        assert!(equals(&custom("a"), &custom("a")).unwrap());
        assert!(equals(&custom("a"), &custom("b")).is_err());
    }

    #[test]
    fn effective_boolean_values() {
        assert!(effective_boolean_value(&plain("x")).unwrap());
        assert!(!effective_boolean_value(&plain("")).unwrap());
        assert!(effective_boolean_value(&integer(3)).unwrap());
        assert!(!effective_boolean_value(&integer(0)).unwrap());
        assert!(!effective_boolean_value(&boolean_literal(false)).unwrap());
        assert!(effective_boolean_value(&Term::from(NamedNode::new("http://example.org/"))).is_err());
    }

    #[test]
    fn unbound_variables_error_but_bound_reports_them() {
        let solution = Solution::new();
        let v = Variable::new("x");
        assert!(matches!(
            evaluate(&Expression::Variable(v.clone()), &solution),
            Err(ExpressionError::UnboundVariable(_))
        ));
        assert!(!is_true(evaluate(&Expression::Bound(v), &solution)));
    }
}
