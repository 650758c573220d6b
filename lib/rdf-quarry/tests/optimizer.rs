//! End-to-end checks of the rewrite pipeline: parse a query, run the full
//! optimizer, and assert on the rendered algebra.

use rdf_quarry::algebra::{Optimizer, Query};
use rdf_quarry::engine::{EvaluationContext, MemoryDataset, SimpleEvaluator};
use rdf_quarry::model::{NamedNode, Triple};

fn optimized(text: &str) -> String {
    let mut query = Query::parse(text, None).unwrap();
    Optimizer::optimize(&mut query);
    query.pattern().to_string()
}

#[test]
fn ask_bgp_stops_at_the_first_solution() {
    assert_eq!(
        optimized("ASK { ?s ?p ?o }"),
        "(ask-bgp (triple ?s ?p ?o))"
    );
}

#[test]
fn ask_union_specializes_both_branches() {
    assert_eq!(
        optimized(
            "PREFIX ex: <http://example.org/> \
             ASK { { ?s ex:p ?o } UNION { ?s ex:q ?o } }"
        ),
        "(ask-union (ask-bgp (triple ?s <http://example.org/p> ?o)) \
         (ask-bgp (triple ?s <http://example.org/q> ?o)))"
    );
}

#[test]
fn limit_and_offset_propagate_into_a_lazy_bgp() {
    assert_eq!(
        optimized("SELECT ?s WHERE { ?s ?p ?o } LIMIT 10 OFFSET 5"),
        "(slice 5 10 (project (?s) (lazy-bgp 15 (triple ?s ?p ?o))))"
    );
}

#[test]
fn order_by_blocks_the_lazy_specialization() {
    let rewritten = optimized("SELECT ?s WHERE { ?s ?p ?o } ORDER BY ?s LIMIT 10");
    assert!(rewritten.contains("(bgp "), "{rewritten}");
    assert!(!rewritten.contains("lazy-bgp"), "{rewritten}");
}

#[test]
fn selective_patterns_run_first_and_filters_split_the_bgp() {
    let rewritten = optimized(
        "PREFIX ex: <http://example.org/> \
         SELECT * WHERE { ?s ?p ?o . ?s ex:name ?name FILTER(?name = \"x\") }",
    );
    assert!(
        rewritten.contains(
            "(join (filter (= ?name \"x\") \
             (bgp (triple ?s <http://example.org/name> ?name))) \
             (bgp (triple ?s ?p ?o)))"
        ),
        "{rewritten}"
    );
}

#[test]
fn variable_equality_filters_become_extends() {
    let rewritten = optimized(
        "PREFIX ex: <http://example.org/> \
         SELECT * WHERE { ?a ex:p ?c . ?b ex:q ?d FILTER(?a = ?b) }",
    );
    assert!(rewritten.contains("(extend (?b ?a)"), "{rewritten}");
    assert!(
        rewritten.contains("(triple ?a <http://example.org/q> ?d)"),
        "{rewritten}"
    );
    assert!(!rewritten.contains("(filter"), "{rewritten}");
}

#[test]
fn accept_all_equality_becomes_a_filtered_product_instead() {
    let rewritten = optimized("SELECT * WHERE { ?a ?b ?c . ?d ?e ?f FILTER(?a = ?d) }");
    assert!(
        rewritten.contains(
            "(filtered-product (= ?a ?d) (bgp (triple ?a ?b ?c)) (bgp (triple ?d ?e ?f)))"
        ),
        "{rewritten}"
    );
}

#[test]
fn cross_component_comparisons_become_filtered_products() {
    let rewritten = optimized(
        "PREFIX ex: <http://example.org/> \
         SELECT * WHERE { ?a ex:p ?b . ?c ex:q ?d FILTER(?b < ?d) }",
    );
    assert!(
        rewritten.contains(
            "(filtered-product (< ?b ?d) \
             (bgp (triple ?a <http://example.org/p> ?b)) \
             (bgp (triple ?c <http://example.org/q> ?d)))"
        ),
        "{rewritten}"
    );
}

#[test]
fn pushed_filters_preserve_solutions_of_partially_binding_unions() {
    // The join, not the union operand, binds ?z for the first branch, so
    // the filter must not move into the union. The rewritten plan has to
    // return exactly what the unoptimized tree returns.
    let iri = |s: &str| NamedNode::new(format!("http://example.org/{s}"));
    let mut dataset = MemoryDataset::new();
    dataset.insert(Triple::new(iri("s1"), iri("a"), iri("o1")));
    dataset.insert(Triple::new(iri("z1"), iri("r"), iri("w1")));
    let text = "PREFIX ex: <http://example.org/> \
         SELECT * WHERE { { { ?s ex:a ?o } UNION { ?s ex:b ?z } } \
         ?z ex:r ?w FILTER(?z = ex:z1) }";
    let count = |query: &Query| {
        let context = EvaluationContext::new(query, 0);
        SimpleEvaluator::new(&dataset, &context)
            .evaluate(query.pattern())
            .unwrap()
            .len()
    };
    let plain = Query::parse(text, None).unwrap();
    let mut rewritten = Query::parse(text, None).unwrap();
    Optimizer::optimize(&mut rewritten);
    assert_eq!(count(&plain), 1);
    assert_eq!(count(&rewritten), count(&plain));
}

#[test]
fn optional_right_sides_disqualify_the_implicit_join() {
    let rewritten = optimized(
        "PREFIX ex: <http://example.org/> \
         SELECT * WHERE { ?a ex:p ?c OPTIONAL { ?b ex:q ?a } FILTER(?a = ?b) }",
    );
    assert!(rewritten.contains("(filter (= ?a ?b)"), "{rewritten}");
}
