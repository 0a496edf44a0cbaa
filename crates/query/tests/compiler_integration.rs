use rivet_core::{Row, Value};
use rivet_index::Index;
use rivet_query::{compile, Direction, Ir, Join, JoinType, OperatorRegistry, QueryIr, Source};

fn no_index(_collection: &str, _field: &str) -> Option<&dyn Index> {
    None
}

#[test]
fn compiles_simple_filtered_query() {
    let ir = QueryIr::collection("users", "u")
        .filter(Ir::func("gt", vec![Ir::field("age"), Ir::val(21i64)]))
        .order_by(Ir::field("age"), Direction::Desc)
        .limit(10);

    let registry = OperatorRegistry::new();
    let compiled = compile(ir, &registry, &no_index).expect("valid query compiles");

    let filter = compiled.residual_filter.expect("where clause compiled");
    let adult = Row::from_pairs(vec![("age", Value::Int(30))]);
    let minor = Row::from_pairs(vec![("age", Value::Int(10))]);
    assert_eq!(filter(&adult), Value::Bool(true));
    assert_eq!(filter(&minor), Value::Bool(false));
    assert_eq!(compiled.limit, Some(10));
    assert_eq!(compiled.order_by.len(), 1);
}

#[test]
fn rejects_query_referencing_unknown_alias() {
    let ir = QueryIr::collection("users", "u")
        .join(Join {
            source: Source::Collection { collection_id: "orders".into(), alias: "o".into() },
            join_type: JoinType::Inner,
            left_key: Ir::path(&["u", "id"]),
            right_key: Ir::path(&["o", "user_id"]),
        })
        .filter(Ir::func("eq", vec![Ir::path(&["ghost", "id"]), Ir::val(1i64)]));

    let registry = OperatorRegistry::new();
    let err = compile(ir, &registry, &no_index).unwrap_err();
    assert_eq!(err.kind(), "InvalidQuery");
}

#[test]
fn join_query_reports_both_collection_dependencies() {
    let ir = QueryIr::collection("users", "u").join(Join {
        source: Source::Collection { collection_id: "orders".into(), alias: "o".into() },
        join_type: JoinType::Left,
        left_key: Ir::path(&["u", "id"]),
        right_key: Ir::path(&["o", "user_id"]),
    });

    let registry = OperatorRegistry::new();
    let compiled = compile(ir, &registry, &no_index).unwrap();
    assert_eq!(compiled.dependencies, vec!["users".to_string(), "orders".to_string()]);
}

#[test]
fn subquery_dependency_is_collected_transitively() {
    let inner = QueryIr::collection("orders", "o").filter(Ir::func("eq", vec![Ir::field("status"), Ir::val("paid")]));
    let ir = QueryIr::from(Source::Query { subquery: Box::new(inner), alias: "paid_orders".into() });

    let registry = OperatorRegistry::new();
    let compiled = compile(ir, &registry, &no_index).unwrap();
    assert_eq!(compiled.dependencies, vec!["orders".to_string()]);
}
