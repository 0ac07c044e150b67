use crate::access::{Node, Value};
use crate::ast::Literal;
use crate::compile::{Cmp, Op, Pattern, Quantifier, TextOp};
use crate::FilterError;
use regex::Regex;
use std::cmp::Ordering;

fn eval_error(message: impl Into<String>) -> FilterError {
    FilterError::Eval(message.into())
}

fn literal(lit: &Literal) -> Value<'_> {
    match lit {
        Literal::Bool(b) => Value::Bool(*b),
        Literal::Int(v) => Value::Int(*v),
        Literal::Float(v) => Value::Float(*v),
        Literal::Str(s) => Value::Str(s),
    }
}

/// Evaluate `op` against the scope stack. `scopes[0]` is the host; quantifiers
/// push each list element for the duration of their predicate.
pub fn eval<'a>(op: &'a Op, scopes: &mut Vec<Node<'a>>) -> Result<Value<'a>, FilterError> {
    match op {
        Op::Lit(lit) => Ok(literal(lit)),
        Op::Array(items) => Ok(Value::Array(items.iter().map(literal).collect())),
        Op::Field { depth, path } => field(scopes, *depth, path),
        Op::Not(inner) => Ok(Value::Bool(!truth(inner, scopes)?)),
        Op::Neg(inner) => match eval(inner, scopes)? {
            Value::Int(v) => v
                .checked_neg()
                .map(Value::Int)
                .ok_or_else(|| eval_error(format!("cannot negate {v}"))),
            Value::Float(v) => Ok(Value::Float(-v)),
            other => Err(eval_error(format!("cannot negate {other:?}"))),
        },
        Op::And(terms) => {
            for term in terms {
                if !truth(term, scopes)? {
                    return Ok(Value::Bool(false));
                }
            }
            Ok(Value::Bool(true))
        }
        Op::Or(terms) => {
            for term in terms {
                if truth(term, scopes)? {
                    return Ok(Value::Bool(true));
                }
            }
            Ok(Value::Bool(false))
        }
        Op::Compare(cmp, l, r) => {
            let (l, r) = (eval(l, scopes)?, eval(r, scopes)?);
            let ord = order(&l, &r)?;
            let hit = match cmp {
                Cmp::Eq => ord == Some(Ordering::Equal),
                Cmp::Ne => ord != Some(Ordering::Equal),
                Cmp::Lt => ord == Some(Ordering::Less),
                Cmp::Le => matches!(ord, Some(Ordering::Less | Ordering::Equal)),
                Cmp::Gt => ord == Some(Ordering::Greater),
                Cmp::Ge => matches!(ord, Some(Ordering::Greater | Ordering::Equal)),
            };
            Ok(Value::Bool(hit))
        }
        Op::In { needle, haystack, negate } => {
            let needle = eval(needle, scopes)?;
            let found = match eval(haystack, scopes)? {
                Value::Array(items) => {
                    let mut found = false;
                    for item in &items {
                        if order(&needle, item)? == Some(Ordering::Equal) {
                            found = true;
                            break;
                        }
                    }
                    found
                }
                Value::Strings(items) => {
                    let needle = text(&needle)?;
                    items.iter().any(|s| s == needle)
                }
                other => return Err(eval_error(format!("cannot search in {other:?}"))),
            };
            Ok(Value::Bool(found != *negate))
        }
        Op::Text(t, l, r) => {
            let (hay, pat) = (eval(l, scopes)?, eval(r, scopes)?);
            let pat = text(&pat)?;
            let hit = match (t, hay) {
                (TextOp::Contains, Value::Strings(items)) => items.iter().any(|s| s == pat),
                (TextOp::Contains, hay) => text(&hay)?.contains(pat),
                (TextOp::StartsWith, hay) => text(&hay)?.starts_with(pat),
                (TextOp::EndsWith, hay) => text(&hay)?.ends_with(pat),
            };
            Ok(Value::Bool(hit))
        }
        Op::Matches(subject, pattern) => {
            let subject = eval(subject, scopes)?;
            let subject = text(&subject)?;
            let hit = match pattern {
                Pattern::Static(re) => re.is_match(subject),
                Pattern::Dynamic(src) => {
                    let src = eval(src, scopes)?;
                    let src = text(&src)?;
                    let re = Regex::new(src).map_err(|e| eval_error(format!("invalid pattern: {e}")))?;
                    re.is_match(subject)
                }
            };
            Ok(Value::Bool(hit))
        }
        Op::Quantify { quantifier, list, body } => quantify(*quantifier, list, body, scopes),
        Op::Len(inner) => {
            let n = match eval(inner, scopes)? {
                Value::Str(s) => s.chars().count(),
                Value::Strings(items) => items.len(),
                Value::Array(items) => items.len(),
                Value::List(nodes) => nodes.len(),
                other => return Err(eval_error(format!("len does not apply to {other:?}"))),
            };
            Ok(Value::Int(i64::try_from(n).unwrap_or(i64::MAX)))
        }
    }
}

/// Evaluate an operand that was type-checked as boolean.
pub fn truth<'a>(op: &'a Op, scopes: &mut Vec<Node<'a>>) -> Result<bool, FilterError> {
    match eval(op, scopes)? {
        Value::Bool(b) => Ok(b),
        other => Err(eval_error(format!("expected bool, found {other:?}"))),
    }
}

fn text<'v>(v: &'v Value<'_>) -> Result<&'v str, FilterError> {
    match v {
        Value::Str(s) => Ok(*s),
        other => Err(eval_error(format!("expected string, found {other:?}"))),
    }
}

fn field<'a>(scopes: &[Node<'a>], depth: usize, path: &[&'static str]) -> Result<Value<'a>, FilterError> {
    let Some(start) = scopes.get(depth) else {
        return Err(eval_error(format!("no scope at depth {depth}")));
    };
    let mut current = Value::Object(*start);
    for name in path {
        let Value::Object(node) = current else {
            return Err(eval_error(format!("cannot read '{name}' from {current:?}")));
        };
        current = node
            .get(name)
            .ok_or_else(|| eval_error(format!("{} has no field '{name}'", node.shape().name())))?;
    }
    Ok(current)
}

/// `None` when the operands are not comparable, which only equality tolerates.
fn order(l: &Value<'_>, r: &Value<'_>) -> Result<Option<Ordering>, FilterError> {
    let ord = match (l, r) {
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        (Value::Int(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
        (Value::Float(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
        (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
        (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::Int(_) | Value::Float(_) | Value::Str(_) | Value::Bool(_), _) => None,
        (other, _) => return Err(eval_error(format!("cannot compare {other:?}"))),
    };
    Ok(ord)
}

fn quantify<'a>(
    quantifier: Quantifier,
    list: &'a Op,
    body: &'a Op,
    scopes: &mut Vec<Node<'a>>,
) -> Result<Value<'a>, FilterError> {
    let nodes = match eval(list, scopes)? {
        Value::List(nodes) => nodes,
        other => return Err(eval_error(format!("expected a list, found {other:?}"))),
    };
    let mut count: i64 = 0;
    for node in nodes {
        scopes.push(node);
        let hit = truth(body, scopes);
        scopes.pop();
        match (quantifier, hit?) {
            (Quantifier::Any, true) => return Ok(Value::Bool(true)),
            (Quantifier::All, false) | (Quantifier::None, true) => return Ok(Value::Bool(false)),
            (Quantifier::One, true) if count == 1 => return Ok(Value::Bool(false)),
            (Quantifier::Count | Quantifier::One, true) => count += 1,
            _ => {}
        }
    }
    Ok(match quantifier {
        Quantifier::Any => Value::Bool(false),
        Quantifier::All | Quantifier::None => Value::Bool(true),
        Quantifier::One => Value::Bool(count == 1),
        Quantifier::Count => Value::Int(count),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::compile;
    use crate::parser::parse;
    use scanfmt_core::{Host, HostStatus, Port, PortService};

    fn run(src: &str, host: &Host) -> Result<bool, FilterError> {
        let op = compile(&parse(src)?)?;
        let mut scopes = vec![Node::Host(host)];
        truth(&op, &mut scopes)
    }

    fn host() -> Host {
        Host {
            start_time: 1_700_000_000,
            status: HostStatus { state: "up".into(), reason: "syn-ack".into() },
            ports: vec![
                Port {
                    port_id: 22,
                    service: PortService {
                        name: "ssh".into(),
                        product: "OpenSSH".into(),
                        cpe: vec!["cpe:/a:openbsd:openssh:8.9".into()],
                        ..Default::default()
                    },
                    ..Default::default()
                },
                Port {
                    port_id: 80,
                    service: PortService { name: "http".into(), product: "nginx".into(), ..Default::default() },
                    ..Default::default()
                },
            ],
            ..Default::default()
        }
    }

    #[test]
    fn quantifiers() {
        let h = host();
        assert!(run("any(Port, {.PortID == 80})", &h).unwrap());
        assert!(!run("any(Port, {.PortID == 443})", &h).unwrap());
        assert!(run("all(Port, {.PortID < 1024})", &h).unwrap());
        assert!(run(r#"none(Port, {.Service.Name == "ftp"})"#, &h).unwrap());
        assert!(run("count(Port, {.PortID > 0}) == 2", &h).unwrap());
        assert!(run("len(Port) == 2 && len(Status.State) == 2", &h).unwrap());
        let empty = Host::default();
        assert!(!run("any(Port, {true})", &empty).unwrap());
        assert!(run("all(Port, {false})", &empty).unwrap());
    }

    #[test]
    fn one_and_the_current_element() {
        let h = host();
        assert!(run("one(Port, {#.PortID == 22})", &h).unwrap());
        assert!(!run("one(Port, {.PortID > 0})", &h).unwrap());
        assert!(!run("one(Port, {.PortID > 1000})", &h).unwrap());
        assert!(run(r#"any(Port, {#.PortID == 80 && #.Service.Name == "http"})"#, &h).unwrap());
        assert!(!run("one(Port, {true})", &Host::default()).unwrap());
    }

    #[test]
    fn one_stops_at_the_second_match() {
        let mut h = host();
        h.ports.push(Port { port_id: 443, ..Default::default() });
        h.ports[2].service.version = "(".into();
        // the third port would fail to evaluate; two hits already settle it
        assert!(!run(r#"one(Port, {.PortID < 100 || .Service.Name matches .Service.Version})"#, &h).unwrap());
    }

    #[test]
    fn long_chains_evaluate_without_recursion() {
        let h = host();
        let any_of = (0..5000).map(|i| format!("any(Port, {{.PortID == {}}})", 1000 + i)).collect::<Vec<_>>();
        assert!(!run(&any_of.join(" || "), &h).unwrap());
        let all_of = (0..5000).map(|_| "StartTime > 0").collect::<Vec<_>>().join(" && ");
        assert!(run(&all_of, &h).unwrap());
    }

    #[test]
    fn quantifiers_short_circuit() {
        let mut h = host();
        // the second port's dynamic pattern is invalid; stopping at the first port never reaches it
        h.ports[0].service.version = "x".into();
        h.ports[1].service.version = "(".into();
        let pred = r#"any(Port, {.Service.Name matches .Service.Version})"#;
        assert!(run(pred, &h).unwrap_err().to_string().contains("invalid pattern"));
        assert!(run(r#"any(Port, {.PortID == 22 || .Service.Name matches .Service.Version})"#, &h).unwrap());
        assert!(!run(r#"all(Port, {.PortID == 80 && .Service.Name matches .Service.Version})"#, &h).unwrap());
        assert!(!run(r#"none(Port, {.PortID == 22 || .Service.Name matches .Service.Version})"#, &h).unwrap());
    }

    #[test]
    fn string_operators() {
        let h = host();
        assert!(run(r#"any(Port, {.Service.Product startsWith "Open"})"#, &h).unwrap());
        assert!(run(r#"any(Port, {.Service.Product endsWith "inx"})"#, &h).unwrap());
        assert!(run(r#"any(Port, {.Service.CPE contains "cpe:/a:openbsd:openssh:8.9"})"#, &h).unwrap());
        assert!(!run(r#"any(Port, {.Service.CPE contains "openssh"})"#, &h).unwrap());
        assert!(run(r#"Status.Reason contains "ack""#, &h).unwrap());
        assert!(run(r#"any(Port, {.Service.Product matches "^(?i)openssh$"})"#, &h).unwrap());
        assert!(run(r#"Status.State in ["up", "unknown"] and Status.State not in ["down"]"#, &h).unwrap());
    }

    #[test]
    fn numbers_compare_across_kinds() {
        let h = host();
        assert!(run("StartTime >= 1700000000.0", &h).unwrap());
        assert!(run("any(Port, {.PortID in [22.0]})", &h).unwrap());
        assert!(run("-StartTime < 0", &h).unwrap());
    }

    #[test]
    fn outer_scope_is_visible_in_closures() {
        let mut h = host();
        assert!(run(r#"any(Port, {.PortID == 22 && Status.State == "up"})"#, &h).unwrap());
        h.status.state = "down".into();
        assert!(!run(r#"any(Port, {.PortID == 22 && Status.State == "up"})"#, &h).unwrap());
    }
}
