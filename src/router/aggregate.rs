//! Response aggregation: combines the per-node (or per-slot-group)
//! results of a fanned-out command into the single value the caller
//! sees, per each command's declared [`AggregationPolicy`].

use crate::codec::Value;
use crate::error::{CoreError, Result};
use crate::router::command_table::AggregationPolicy;

/// Combines a set of per-target results according to `policy`.
///
/// `results` carries one entry per target in dispatch order; a target
/// that failed is represented as `Err`, not omitted, so `AllSucceeded`
/// and friends can see it.
pub fn aggregate(policy: AggregationPolicy, results: Vec<Result<Value>>) -> Result<Value> {
    match policy {
        AggregationPolicy::OneSucceeded => one_succeeded(results),
        AggregationPolicy::FirstSucceededNonEmptyOrAllEmpty => {
            first_succeeded_non_empty_or_all_empty(results)
        }
        AggregationPolicy::AllSucceeded => all_succeeded(results),
        AggregationPolicy::CombineArrays => combine_arrays(results),
        AggregationPolicy::CombineMaps => combine_maps(results),
        AggregationPolicy::AggregateLogicalAnd => aggregate_logical_and(results),
        AggregationPolicy::AggregateMin => aggregate_min(results),
        AggregationPolicy::AggregateSum => aggregate_sum(results),
        AggregationPolicy::Special => Err(CoreError::Protocol(
            "command requires a dedicated aggregation handler".into(),
        )),
    }
}

fn one_succeeded(results: Vec<Result<Value>>) -> Result<Value> {
    let mut last_err = None;
    for r in results {
        match r {
            Ok(v) => return Ok(v),
            Err(e) => last_err = Some(e),
        }
    }
    Err(last_err.unwrap_or_else(|| CoreError::ClusterDown("no targets reachable".into())))
}

fn first_succeeded_non_empty_or_all_empty(results: Vec<Result<Value>>) -> Result<Value> {
    let mut last_ok_empty: Option<Value> = None;
    let mut last_err = None;
    for r in results {
        match r {
            Ok(Value::Nil) => last_ok_empty = Some(Value::Nil),
            Ok(Value::BulkString(ref b)) if b.is_empty() => last_ok_empty = Some(Value::BulkString(vec![])),
            Ok(Value::Array(ref a)) if a.is_empty() => last_ok_empty = Some(Value::Array(vec![])),
            Ok(v) => return Ok(v),
            Err(e) => last_err = Some(e),
        }
    }
    match last_ok_empty {
        Some(v) => Ok(v),
        None => Err(last_err.unwrap_or_else(|| CoreError::ClusterDown("no targets reachable".into()))),
    }
}

fn all_succeeded(results: Vec<Result<Value>>) -> Result<Value> {
    let mut out = Vec::with_capacity(results.len());
    for r in results {
        out.push(r?);
    }
    out.into_iter()
        .last()
        .ok_or_else(|| CoreError::ClusterDown("no targets dispatched".into()))
}

fn combine_arrays(results: Vec<Result<Value>>) -> Result<Value> {
    let mut out = Vec::new();
    for r in results {
        match r? {
            Value::Array(items) | Value::Set(items) => out.extend(items),
            other => out.push(other),
        }
    }
    Ok(Value::Array(out))
}

fn combine_maps(results: Vec<Result<Value>>) -> Result<Value> {
    let mut out: Vec<(Value, Value)> = Vec::new();
    for r in results {
        match r? {
            Value::Map(pairs) => {
                for (key, value) in pairs {
                    if out.iter().any(|(k, _)| *k == key) {
                        return Err(CoreError::Protocol(format!(
                            "duplicate key {key:?} across CombineMaps aggregation targets"
                        )));
                    }
                    out.push((key, value));
                }
            }
            other => {
                return Err(CoreError::Protocol(format!(
                    "expected map response for CombineMaps aggregation, got {other:?}"
                )))
            }
        }
    }
    Ok(Value::Map(out))
}

fn aggregate_logical_and(results: Vec<Result<Value>>) -> Result<Value> {
    let mut all_true = true;
    for r in results {
        match r? {
            Value::Integer(0) | Value::Boolean(false) => all_true = false,
            Value::Integer(_) | Value::Boolean(true) => {}
            other => {
                return Err(CoreError::Protocol(format!(
                    "expected boolean-like response for AggregateLogicalAnd, got {other:?}"
                )))
            }
        }
    }
    Ok(Value::Boolean(all_true))
}

fn aggregate_min(results: Vec<Result<Value>>) -> Result<Value> {
    let mut min: Option<i64> = None;
    for r in results {
        let n = expect_integer(r?)?;
        min = Some(match min {
            Some(cur) => cur.min(n),
            None => n,
        });
    }
    min.map(Value::Integer)
        .ok_or_else(|| CoreError::ClusterDown("no targets dispatched".into()))
}

fn aggregate_sum(results: Vec<Result<Value>>) -> Result<Value> {
    let mut sum: i64 = 0;
    let mut any = false;
    for r in results {
        sum = sum.saturating_add(expect_integer(r?)?);
        any = true;
    }
    if any {
        Ok(Value::Integer(sum))
    } else {
        Err(CoreError::ClusterDown("no targets dispatched".into()))
    }
}

fn expect_integer(v: Value) -> Result<i64> {
    match v {
        Value::Integer(n) => Ok(n),
        other => Err(CoreError::Protocol(format!(
            "expected integer response for numeric aggregation, got {other:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_succeeded_returns_first_ok() {
        let results = vec![
            Err(CoreError::ConnectionClosed("a".into())),
            Ok(Value::Integer(1)),
            Err(CoreError::ConnectionClosed("b".into())),
        ];
        assert!(matches!(one_succeeded(results), Ok(Value::Integer(1))));
    }

    #[test]
    fn combine_arrays_flattens_nested_arrays() {
        let results = vec![
            Ok(Value::Array(vec![Value::Integer(1), Value::Integer(2)])),
            Ok(Value::Array(vec![Value::Integer(3)])),
        ];
        let Value::Array(flat) = combine_arrays(results).unwrap() else {
            panic!("expected array");
        };
        assert_eq!(flat.len(), 3);
    }

    #[test]
    fn combine_maps_unions_disjoint_keys() {
        let results = vec![
            Ok(Value::Map(vec![(Value::BulkString(b"a".to_vec()), Value::Integer(1))])),
            Ok(Value::Map(vec![(Value::BulkString(b"b".to_vec()), Value::Integer(2))])),
        ];
        let Value::Map(pairs) = combine_maps(results).unwrap() else {
            panic!("expected map");
        };
        assert_eq!(pairs.len(), 2);
    }

    #[test]
    fn combine_maps_rejects_duplicate_keys() {
        let results = vec![
            Ok(Value::Map(vec![(Value::BulkString(b"a".to_vec()), Value::Integer(1))])),
            Ok(Value::Map(vec![(Value::BulkString(b"a".to_vec()), Value::Integer(2))])),
        ];
        assert!(combine_maps(results).is_err());
    }

    #[test]
    fn aggregate_sum_adds_across_shards() {
        let results = vec![Ok(Value::Integer(2)), Ok(Value::Integer(3)), Ok(Value::Integer(5))];
        assert!(matches!(aggregate_sum(results), Ok(Value::Integer(10))));
    }

    #[test]
    fn aggregate_logical_and_short_circuits_to_false() {
        let results = vec![Ok(Value::Boolean(true)), Ok(Value::Integer(0))];
        assert!(matches!(
            aggregate_logical_and(results),
            Ok(Value::Boolean(false))
        ));
    }

    #[test]
    fn all_succeeded_propagates_first_error() {
        let results = vec![Ok(Value::Integer(1)), Err(CoreError::ClusterDown("x".into()))];
        assert!(all_succeeded(results).is_err());
    }

    #[test]
    fn first_succeeded_non_empty_falls_back_to_empty() {
        let results = vec![Ok(Value::Array(vec![])), Ok(Value::Nil)];
        let v = first_succeeded_non_empty_or_all_empty(results).unwrap();
        assert!(matches!(v, Value::Array(_) | Value::Nil));
    }
}
