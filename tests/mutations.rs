//! Topic and link mutations through the engine

mod common;

use common::{farm_graph, new_graph};
use std::sync::Arc;
use std::thread;
use topicgraph::{
    AlertKind, GraphError, LinkId, OpenStore, SqliteStore, Synonym, TopicGraph, TopicId,
};

fn sorted(mut ids: Vec<TopicId>) -> Vec<TopicId> {
    ids.sort();
    ids
}

// === Topics ===

#[test]
fn upsert_topic_defaults_to_root() {
    let (graph, repo) = new_graph();
    let result = graph.upsert_topic(&repo.id, "Soil", &[], Some("Dirt")).unwrap();

    assert!(result.created);
    assert_eq!(result.alerts[0].kind, AlertKind::Success);
    assert_eq!(result.topic.description.as_deref(), Some("Dirt"));

    let parents = graph.parent_topics(&repo.id, &result.topic.id).unwrap();
    assert_eq!(parents.len(), 1);
    assert_eq!(parents[0].id, repo.root_topic_id);
}

#[test]
fn upsert_existing_name_warns_and_adds_parents() {
    let farm = farm_graph();
    let repo = &farm.repo;

    let result = farm
        .graph
        .upsert_topic(&repo.id, "crop ROTATION", &[farm.a.clone()], None)
        .unwrap();
    assert!(!result.created);
    assert_eq!(result.topic.id, farm.crop_rotation);
    assert!(result.alerts.iter().any(|a| a.is_warning()));

    let parents = farm.graph.parent_topics(&repo.id, &farm.crop_rotation).unwrap();
    let names: Vec<String> = parents.iter().map(|t| t.display_name("en")).collect();
    assert_eq!(names, vec!["A", "Agriculture"]);
}

#[test]
fn upsert_with_cycle_parent_applies_the_rest() {
    let farm = farm_graph();
    let repo = &farm.repo;

    // Agriculture already exists; Crop rotation would close a loop, A would not
    let result = farm
        .graph
        .upsert_topic(
            &repo.id,
            "Agriculture",
            &[farm.crop_rotation.clone(), farm.a.clone()],
            None,
        )
        .unwrap();
    let warnings: Vec<_> = result.alerts.iter().filter(|a| a.is_warning()).collect();
    assert_eq!(warnings.len(), 2);
    assert!(warnings
        .iter()
        .any(|a| a.text == "\"Crop rotation\" is a descendant of \"Agriculture\" and cannot be added as a parent topic"));

    let parents = farm.graph.parent_topics(&repo.id, &farm.agriculture).unwrap();
    let ids: Vec<TopicId> = parents.into_iter().map(|t| t.id).collect();
    assert_eq!(sorted(ids), sorted(vec![repo.root_topic_id.clone(), farm.a.clone()]));
}

#[test]
fn upsert_topic_rejects_blank_names() {
    let (graph, repo) = new_graph();
    let err = graph.upsert_topic(&repo.id, "   ", &[], None).unwrap_err();
    assert!(matches!(err, GraphError::Constraint(_)));
}

#[test]
fn missing_parents_are_reported_not_fatal() {
    let (graph, repo) = new_graph();
    let result = graph
        .upsert_topic(&repo.id, "Orphan", &[TopicId::from("nowhere")], None)
        .unwrap();
    assert!(result.created);
    assert!(result.alerts.iter().any(|a| a.is_warning()));

    let parents = graph.parent_topics(&repo.id, &result.topic.id).unwrap();
    assert_eq!(parents[0].id, repo.root_topic_id);
}

#[test]
fn update_parent_topics_replaces_the_set() {
    let farm = farm_graph();
    let repo = &farm.repo;

    let update = farm
        .graph
        .update_parent_topics(&repo.id, &farm.x, &[farm.y.clone()])
        .unwrap();
    assert_eq!(update.parents, vec![farm.y.clone()]);
    assert!(!update.alerts.iter().any(|a| a.is_warning()));

    let under_b = farm.graph.descendants_of(&repo.id, &farm.b).unwrap();
    assert!(!under_b.contains(&farm.x));
    let under_y = farm.graph.descendants_of(&repo.id, &farm.y).unwrap();
    assert!(under_y.contains(&farm.x));
}

#[test]
fn update_parent_topics_falls_back_to_root() {
    let farm = farm_graph();
    let repo = &farm.repo;

    let update = farm
        .graph
        .update_parent_topics(&repo.id, &farm.crop_rotation, &[])
        .unwrap();
    assert_eq!(update.parents, vec![repo.root_topic_id.clone()]);

    // Only rejected parents: same fallback, with a warning
    let update = farm
        .graph
        .update_parent_topics(&repo.id, &farm.a, &[farm.x.clone()])
        .unwrap();
    assert_eq!(update.parents, vec![repo.root_topic_id.clone()]);
    assert!(update.alerts.iter().any(|a| a.is_warning()));
}

#[test]
fn root_topic_cannot_gain_parents() {
    let farm = farm_graph();
    let repo = &farm.repo;
    let err = farm
        .graph
        .update_parent_topics(&repo.id, &repo.root_topic_id, &[farm.a.clone()])
        .unwrap_err();
    assert!(matches!(err, GraphError::Constraint(_)));

    let update = farm
        .graph
        .update_parent_topics(&repo.id, &repo.root_topic_id, &[])
        .unwrap();
    assert!(update.parents.is_empty());
}

#[test]
fn update_synonyms_changes_display_name() {
    let farm = farm_graph();
    let repo = &farm.repo;

    let topic = farm
        .graph
        .update_synonyms(
            &repo.id,
            &farm.agriculture,
            vec![
                Synonym::new("fr", "Agriculture"),
                Synonym::en("Farming"),
                Synonym::en("  "),
            ],
        )
        .unwrap();
    assert_eq!(topic.synonyms.len(), 2);
    assert_eq!(topic.display_name("en"), "Farming");
    assert_eq!(topic.display_name("de"), "Farming");

    let stored = farm.graph.topic(&repo.id, &farm.agriculture).unwrap();
    assert_eq!(stored.synonyms, topic.synonyms);
    assert!(farm.graph.topic_named(&repo.id, "farming").unwrap().is_some());
}

#[test]
fn update_synonyms_rejects_empty_list() {
    let farm = farm_graph();
    let err = farm
        .graph
        .update_synonyms(&farm.repo.id, &farm.agriculture, vec![Synonym::en("")])
        .unwrap_err();
    assert!(matches!(err, GraphError::Constraint(_)));

    let stored = farm.graph.topic(&farm.repo.id, &farm.agriculture).unwrap();
    assert_eq!(stored.display_name("en"), "Agriculture");
}

#[test]
fn update_topic_sets_description() {
    let farm = farm_graph();
    let topic = farm
        .graph
        .update_topic(&farm.repo.id, &farm.a, Some("First letter".into()), None)
        .unwrap();
    assert_eq!(topic.description.as_deref(), Some("First letter"));
    assert_eq!(
        farm.graph.topic(&farm.repo.id, &farm.a).unwrap().description.as_deref(),
        Some("First letter")
    );
}

#[test]
fn finds_topics_by_name() {
    let farm = farm_graph();
    let repo = &farm.repo;

    let found = farm.graph.topic_named(&repo.id, "AGRICULTURE").unwrap().unwrap();
    assert_eq!(found.id, farm.agriculture);
    assert!(farm.graph.topic_named(&repo.id, "Agri").unwrap().is_none());

    farm.graph.upsert_topic(&repo.id, "Cropland", &[], None).unwrap();
    let prefixed = farm.graph.find_topics_by_name(&repo.id, "crop", 10).unwrap();
    let names: Vec<String> = prefixed.iter().map(|t| t.display_name("en")).collect();
    assert_eq!(names, vec!["Cropland", "Crop rotation"]);

    let limited = farm.graph.find_topics_by_name(&repo.id, "crop", 1).unwrap();
    assert_eq!(limited.len(), 1);
}

#[test]
fn upsert_matches_names_across_unicode_case() {
    let (graph, repo) = new_graph();
    let first = graph.upsert_topic(&repo.id, "Économie", &[], None).unwrap();
    assert!(first.created);

    let second = graph.upsert_topic(&repo.id, "économie", &[], None).unwrap();
    assert!(!second.created);
    assert_eq!(second.topic.id, first.topic.id);
    assert!(second.alerts.iter().any(|a| a.is_warning()));

    let found = graph.topic_named(&repo.id, "ÉCONOMIE").unwrap().unwrap();
    assert_eq!(found.id, first.topic.id);
    let prefixed = graph.find_topics_by_name(&repo.id, "éco", 10).unwrap();
    assert_eq!(prefixed.len(), 1);
    assert_eq!(prefixed[0].id, first.topic.id);
}

#[test]
fn child_topics_are_sorted_by_name() {
    let farm = farm_graph();
    let children = farm
        .graph
        .child_topics(&farm.repo.id, &farm.repo.root_topic_id)
        .unwrap();
    let names: Vec<String> = children.iter().map(|t| t.display_name("en")).collect();
    assert_eq!(names, vec!["A", "Agriculture", "B"]);
}

// === Links ===

#[test]
fn upsert_link_defaults_to_root_and_url_title() {
    let (graph, repo) = new_graph();
    let result = graph
        .upsert_link(&repo.id, "HTTPS://Example.com/Soil#top", None, &[])
        .unwrap();

    assert!(result.created);
    assert_eq!(result.link.url, "https://example.com/Soil");
    assert_eq!(result.link.title, "https://example.com/Soil");

    let under_root = graph.child_links(&repo.id, &repo.root_topic_id).unwrap();
    assert_eq!(under_root.len(), 1);
    assert_eq!(under_root[0].id, result.link.id);
}

#[test]
fn upsert_link_deduplicates_by_fingerprint() {
    let farm = farm_graph();
    let repo = &farm.repo;
    let graph = &farm.graph;

    let first = graph
        .upsert_link(&repo.id, "https://example.com/", Some("Example"), &[farm.a.clone()])
        .unwrap();
    let second = graph
        .upsert_link(&repo.id, "https://EXAMPLE.com", Some("Example home"), &[farm.b.clone()])
        .unwrap();

    assert!(!second.created);
    assert_eq!(second.link.id, first.link.id);
    assert_eq!(second.link.title, "Example home");

    let stored = graph.link(&repo.id, &first.link.id).unwrap();
    assert_eq!(stored.title, "Example home");

    // Parents accumulate across upserts
    assert!(graph.descendant_links_of(&repo.id, &farm.a).unwrap().contains(&first.link.id));
    assert!(graph.descendant_links_of(&repo.id, &farm.b).unwrap().contains(&first.link.id));

    // No title keeps the old one
    let third = graph.upsert_link(&repo.id, "https://example.com", None, &[]).unwrap();
    assert_eq!(third.link.title, "Example home");
}

#[test]
fn upsert_link_rejects_invalid_urls() {
    let (graph, repo) = new_graph();
    let err = graph.upsert_link(&repo.id, "not a url", None, &[]).unwrap_err();
    assert!(matches!(err, GraphError::InvalidUrl(_)));
}

#[test]
fn link_parents_update_the_index() {
    let farm = farm_graph();
    let repo = &farm.repo;
    let graph = &farm.graph;

    let link = graph
        .upsert_link(&repo.id, "https://example.com/x", Some("X"), &[farm.x.clone()])
        .unwrap()
        .link;
    assert!(graph.descendant_links_of(&repo.id, &farm.a).unwrap().contains(&link.id));
    assert!(graph.descendant_links_of(&repo.id, &farm.b).unwrap().contains(&link.id));

    let update = graph
        .update_link_parent_topics(&repo.id, &link.id, &[farm.y.clone()])
        .unwrap();
    assert_eq!(update.parents, vec![farm.y.clone()]);
    assert!(graph.descendant_links_of(&repo.id, &farm.a).unwrap().contains(&link.id));
    assert!(!graph.descendant_links_of(&repo.id, &farm.b).unwrap().contains(&link.id));

    assert!(graph.add_link_parent_topic(&repo.id, &link.id, &farm.b).unwrap());
    assert!(!graph.add_link_parent_topic(&repo.id, &link.id, &farm.b).unwrap());
    graph.remove_link_parent_topic(&repo.id, &link.id, &farm.y).unwrap();
    assert!(!graph.descendant_links_of(&repo.id, &farm.y).unwrap().contains(&link.id));
    assert!(graph.descendant_links_of(&repo.id, &farm.b).unwrap().contains(&link.id));

    let err = graph
        .remove_link_parent_topic(&repo.id, &link.id, &farm.b)
        .unwrap_err();
    assert!(matches!(err, GraphError::Constraint(_)));
    let err = graph
        .remove_link_parent_topic(&repo.id, &link.id, &farm.y)
        .unwrap_err();
    assert!(matches!(err, GraphError::EdgeNotFound { .. }));
}

#[test]
fn delete_link_removes_it_everywhere() {
    let farm = farm_graph();
    let repo = &farm.repo;
    let graph = &farm.graph;

    let link = graph
        .upsert_link(&repo.id, "https://example.com/gone", None, &[farm.y.clone()])
        .unwrap()
        .link;
    graph.delete_link(&repo.id, &link.id).unwrap();

    assert!(graph.link(&repo.id, &link.id).unwrap_err().is_not_found());
    assert!(graph.descendant_links_of(&repo.id, &farm.a).unwrap().is_empty());
    assert!(matches!(
        graph.delete_link(&repo.id, &link.id).unwrap_err(),
        GraphError::LinkNotFound(_)
    ));
}

#[test]
fn link_operations_on_unknown_ids_fail() {
    let farm = farm_graph();
    let missing = LinkId::from("missing");
    let err = farm
        .graph
        .add_link_parent_topic(&farm.repo.id, &missing, &farm.a)
        .unwrap_err();
    assert!(matches!(err, GraphError::LinkNotFound(_)));
}

// === Concurrency ===

#[test]
fn concurrent_writers_on_separate_repositories() {
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    let graph = Arc::new(TopicGraph::new(store));

    let handles: Vec<_> = (0..4)
        .map(|n| {
            let graph = Arc::clone(&graph);
            thread::spawn(move || {
                let repo = graph.create_repository(&format!("repo-{n}"), None).unwrap();
                let mut parent = repo.root_topic_id.clone();
                for depth in 0..10 {
                    let topic = graph
                        .upsert_topic(&repo.id, &format!("Level {depth}"), &[parent.clone()], None)
                        .unwrap()
                        .topic;
                    parent = topic.id;
                }
                // The deepest topic may not become an ancestor of the root
                let err = graph
                    .add_parent_topic(&repo.id, &repo.root_topic_id, &parent)
                    .unwrap_err();
                assert!(matches!(err, GraphError::Cycle { .. }));
                repo
            })
        })
        .collect();

    for handle in handles {
        let repo = handle.join().unwrap();
        let descendants = graph.descendants_of(&repo.id, &repo.root_topic_id).unwrap();
        assert_eq!(descendants.len(), 11);
    }
    assert_eq!(graph.list_repositories().unwrap().len(), 4);
}
