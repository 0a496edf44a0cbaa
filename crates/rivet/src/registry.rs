//! The explicit collection/live-query registry (spec.md §9 "Global state",
//! generalized in SPEC_FULL.md §5: a threaded-through `Registry` struct
//! rather than ambient/thread-local state).
//!
//! Every collection and live query a binding layer wants to compose by id
//! — `SELECT * FROM some_live_query` as well as `SELECT * FROM base_table`
//! — is registered here under one id space, so `rivet_reactive::QueryPipeline`
//! and `rivet_query::compile` both see the same name resolution a caller
//! does. The registry is also the one place with the full id graph visible,
//! which is exactly what cross-query cycle detection needs (spec.md §9
//! "Cyclic data" — `rivet_query::compiler::detect_cycles` only ever sees
//! one `QueryIr` at a time and defers this case here by design).

use rivet_collection::Collection;
use rivet_core::{Error, Result};
use rivet_query::{EvaluatorFactory, OperatorRegistry, QueryIr, Source};
use rivet_reactive::{CollectionLike, LiveQueryCollection};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Central id→collection map plus the operator registry every compiled
/// query in this registry shares.
///
/// `Rc<RefCell<_>>`, matching spec.md §5's single-threaded cooperative
/// execution model — the same idiom the teacher's `Database` uses for its
/// `Rc<RefCell<TableCache>>` (`cynos-database/src/database.rs`).
pub struct Registry {
    collections: HashMap<String, Rc<RefCell<dyn CollectionLike>>>,
    /// Direct dependency ids for every registered live query (base
    /// collections have an empty entry here). Used only to keep
    /// `register_query` able to detect cross-query cycles cheaply; it is
    /// not consulted for anything else.
    dependencies: HashMap<String, Vec<String>>,
    operators: OperatorRegistry,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Registry { collections: HashMap::new(), dependencies: HashMap::new(), operators: OperatorRegistry::new() }
    }

    /// Registers a base collection under its own id. Fails if the id is
    /// already taken (a collection and a live query can never share an id
    /// — both are addressed through the same `Source::Collection` path).
    pub fn register_collection<U: 'static>(&mut self, collection: Rc<RefCell<Collection<U>>>) -> Result<()> {
        let id = collection.borrow().id().to_string();
        self.insert(id, collection)
    }

    /// Registers any other `CollectionLike` (chiefly a `LiveQueryCollection`
    /// built by hand rather than through [`Registry::register_query`]) under
    /// its own id.
    pub fn register_collection_like(&mut self, id: impl Into<String>, collection: Rc<RefCell<dyn CollectionLike>>) -> Result<()> {
        self.insert(id.into(), collection)
    }

    fn insert(&mut self, id: String, collection: Rc<RefCell<dyn CollectionLike>>) -> Result<()> {
        if self.collections.contains_key(&id) {
            let e = Error::invalid_query(format!("id '{id}' is already registered"));
            log::warn!("{e}");
            return Err(e);
        }
        log::debug!("registered collection '{id}'");
        self.dependencies.insert(id.clone(), Vec::new());
        self.collections.insert(id, collection);
        Ok(())
    }

    /// Looks up a registered collection or live query by id, for wiring
    /// into a new query's source list or handing to a binding layer.
    pub fn get(&self, id: &str) -> Option<Rc<RefCell<dyn CollectionLike>>> {
        self.collections.get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.collections.contains_key(id)
    }

    /// The shared operator registry every query compiled or built against
    /// this `Registry` sees, including any custom operators registered via
    /// [`Registry::register_custom_operator`].
    pub fn operators(&self) -> &OperatorRegistry {
        &self.operators
    }

    /// Registers a custom `Func`/`Aggregate` evaluator under `name`, usable
    /// by any query compiled or built against this registry's operator set
    /// (spec.md §6 "Custom operators").
    pub fn register_custom_operator(&mut self, name: impl Into<String>, factory: EvaluatorFactory) {
        self.operators.register(name, factory);
    }

    /// Builds and registers a live query under `id`, wiring its `from` plus
    /// every `join` source against collections/live queries already known
    /// to this registry (looked up by `Source::Collection`'s
    /// `collection_id` — an inline `Source::Query` subquery is not resolved
    /// here; register the subquery itself first and reference it by id,
    /// the same way any other live query composes, per
    /// `rivet_reactive::CollectionLike`'s doc comment).
    pub fn register_query(&mut self, id: impl Into<String>, ir: &QueryIr) -> Result<Rc<RefCell<LiveQueryCollection>>> {
        let id = id.into();
        if self.collections.contains_key(&id) {
            return Err(Error::invalid_query(format!("id '{id}' is already registered")));
        }

        let direct_deps = direct_source_ids(ir)?;
        if let Err(e) = self.check_acyclic(&id, &direct_deps) {
            log::warn!("refusing to register query '{id}': {e}");
            return Err(e);
        }

        let mut sources = Vec::with_capacity(direct_deps.len());
        for dep_id in &direct_deps {
            let source = self.collections.get(dep_id).cloned().ok_or_else(|| {
                let e = Error::invalid_query(format!("query '{id}' references unknown collection '{dep_id}'"));
                log::warn!("{e}");
                e
            })?;
            sources.push(source);
        }

        let live = LiveQueryCollection::new_shared(id.clone(), ir, &self.operators, sources);
        log::debug!("registered live query '{id}' over {} source(s)", direct_deps.len());
        self.dependencies.insert(id.clone(), direct_deps);
        self.collections.insert(id, live.clone());
        Ok(live)
    }

    /// True if adding an edge `id -> dep` for each `dep` in `new_deps`
    /// would let a walk starting at `id` reach `id` again.
    fn check_acyclic(&self, id: &str, new_deps: &[String]) -> Result<()> {
        fn walk(dependencies: &HashMap<String, Vec<String>>, target: &str, current: &str, visiting: &mut Vec<String>) -> bool {
            if current == target {
                return true;
            }
            if visiting.contains(&current.to_string()) {
                return false;
            }
            visiting.push(current.to_string());
            let hit = dependencies.get(current).map(|deps| deps.iter().any(|d| walk(dependencies, target, d, visiting))).unwrap_or(false);
            visiting.pop();
            hit
        }

        let mut visiting = Vec::new();
        for dep in new_deps {
            if walk(&self.dependencies, id, dep, &mut visiting) {
                return Err(Error::invalid_query(format!("registering '{id}' would create a cyclic query dependency through '{dep}'")));
            }
        }
        Ok(())
    }
}

/// The ids `ir`'s `from` and each `join` resolve against in this registry,
/// in alias order — `rivet_reactive::QueryPipeline` indexes its scan/join
/// stages positionally against exactly this list.
fn direct_source_ids(ir: &QueryIr) -> Result<Vec<String>> {
    let mut out = Vec::with_capacity(1 + ir.joins.len());
    out.push(collection_id_of(&ir.from)?);
    for j in &ir.joins {
        out.push(collection_id_of(&j.source)?);
    }
    Ok(out)
}

fn collection_id_of(source: &Source) -> Result<String> {
    match source {
        Source::Collection { collection_id, .. } => Ok(collection_id.clone()),
        Source::Query { .. } => Err(Error::invalid_query(
            "inline subquery sources are not wired by Registry::register_query; register the subquery under its own id first",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rivet_collection::CollectionConfig;
    use rivet_core::{Row, Value};
    use rivet_query::Ir;

    fn new_collection(id: &str) -> Rc<RefCell<Collection>> {
        let mut c = Collection::new(id, CollectionConfig::with_id_key());
        c.begin();
        c.commit();
        c.mark_ready();
        Rc::new(RefCell::new(c))
    }

    #[test]
    fn registering_the_same_id_twice_fails() {
        let mut registry = Registry::new();
        registry.register_collection(new_collection("orders")).unwrap();
        let err = registry.register_collection(new_collection("orders")).unwrap_err();
        assert_eq!(err.kind(), "InvalidQuery");
    }

    #[test]
    fn register_query_wires_sources_by_alias_order() {
        let mut registry = Registry::new();
        let orders = new_collection("orders");
        orders.borrow_mut().apply_insert(1, Row::from_pairs(vec![("id", Value::Int(1)), ("amount", Value::Int(42))])).unwrap();
        registry.register_collection(orders).unwrap();

        let ir = QueryIr::collection("orders", "o").filter(Ir::func("gt", vec![Ir::field("amount"), Ir::val(10i64)]));
        let live = registry.register_query("big_orders", &ir).unwrap();
        assert_eq!(live.borrow().len(), 1);
        assert!(registry.contains("big_orders"));
    }

    #[test]
    fn composing_a_query_over_a_registered_live_query_is_allowed() {
        let mut registry = Registry::new();
        let orders = new_collection("orders");
        orders.borrow_mut().apply_insert(1, Row::from_pairs(vec![("id", Value::Int(1)), ("amount", Value::Int(42))])).unwrap();
        registry.register_collection(orders).unwrap();

        let inner = QueryIr::collection("orders", "o");
        registry.register_query("all_orders", &inner).unwrap();

        let outer = QueryIr::collection("all_orders", "a").filter(Ir::func("gt", vec![Ir::field("amount"), Ir::val(10i64)]));
        let live = registry.register_query("big_orders_v2", &outer).unwrap();
        assert_eq!(live.borrow().len(), 1);
    }

    #[test]
    fn a_query_referencing_an_unknown_collection_fails() {
        let mut registry = Registry::new();
        let ir = QueryIr::collection("nope", "n");
        let err = registry.register_query("q", &ir).unwrap_err();
        assert_eq!(err.kind(), "InvalidQuery");
    }
}
