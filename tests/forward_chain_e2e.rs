use bioreasoner::{
    ContradictionKind, EngineConfig, Entity, EntityId, EntityKind, EntityRegistry, ExceptionTieBreak, Fact,
    FactPattern, ProvenanceSource, ReasoningEngine, ReasoningResult, Rule, RuleOutcome, RuleSet, RunStatus, Term,
    Value,
};

fn registry(names: &[&str]) -> EntityRegistry {
    EntityRegistry::from_entities(names.iter().map(|n| Entity::new(*n))).unwrap()
}

fn var(name: &str) -> Term {
    Term::var(name)
}

fn activation_rule() -> Rule {
    Rule::builder("activation_marks_target_active")
        .when(FactPattern::new(var("X"), "activates", var("Y")))
        .then(FactPattern::new(var("Y"), "active", Term::value(true)))
        .build()
        .unwrap()
}

fn run(rules: Vec<Rule>, names: &[&str], facts: Vec<Fact>, config: EngineConfig) -> ReasoningResult {
    let engine = ReasoningEngine::new(RuleSet::new(rules).unwrap(), config).unwrap();
    engine.run(&registry(names), facts).unwrap()
}

#[test]
fn basic_activation_reaches_fixpoint_at_round_two() {
    let input = Fact::new("A", "activates", EntityId::new("B"));
    let result = run(
        vec![activation_rule()],
        &["A", "B"],
        vec![input.clone()],
        EngineConfig::default(),
    );

    assert_eq!(result.status(), RunStatus::Fixpoint);
    assert_eq!(result.rounds(), 2);

    let derived: Vec<_> = result.derived().collect();
    assert_eq!(derived.len(), 1);
    assert_eq!(*derived[0].fact, Fact::new("B", "active", true));
    assert_eq!(derived[0].round, 1);

    let records = result.explain(&Fact::new("B", "active", true)).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].rule().map(|r| r.as_str()), Some("activation_marks_target_active"));
    assert_eq!(records[0].round, 1);
    let input_id = result.store().find(&input).unwrap();
    assert_eq!(records[0].antecedents, vec![input_id]);

    let summaries = result.round_summaries();
    assert_eq!(summaries.len(), 2);
    assert_eq!(summaries[0].inserted, 1);
    assert_eq!(summaries[1].inserted, 0);
    assert_eq!(summaries[1].duplicates, 1);
}

#[test]
fn rule_description_and_citation_reach_explanations() {
    let rule = Rule::builder("activation_marks_target_active")
        .when(FactPattern::new(var("X"), "activates", var("Y")))
        .then(FactPattern::new(var("Y"), "active", Term::value(true)))
        .description("An activator switches its target on")
        .citation("doi:10.1000/activation")
        .build()
        .unwrap();
    let result = run(
        vec![rule],
        &["A", "B"],
        vec![Fact::new("A", "activates", EntityId::new("B"))],
        EngineConfig::default(),
    );

    let tree = result.derivation_chain(&Fact::new("B", "active", true)).unwrap();
    let text = tree.to_string();
    assert!(text.contains("description: An activator switches its target on"));
    assert!(text.contains("citation: doi:10.1000/activation"));
    let tree_json = serde_json::to_value(&tree).unwrap();
    assert_eq!(tree_json["citation"], "doi:10.1000/activation");

    let json = result.to_json().unwrap();
    let note = &json["rules"]["activation_marks_target_active"];
    assert_eq!(note["description"], "An activator switches its target on");
    assert_eq!(note["citation"], "doi:10.1000/activation");
}

#[test]
fn unannotated_rules_leave_no_rules_section() {
    let result = run(
        vec![activation_rule()],
        &["A", "B"],
        vec![Fact::new("A", "activates", EntityId::new("B"))],
        EngineConfig::default(),
    );
    assert!(result.rule_notes().is_empty());
    assert!(result.to_json().unwrap().get("rules").is_none());
}

#[test]
fn opposite_conclusions_are_reported_once() {
    let inhibition = Rule::builder("inhibition_marks_target_inactive")
        .when(FactPattern::new(var("X"), "inhibits", var("Y")))
        .then(FactPattern::new(var("Y"), "active", Term::value(true)).negated())
        .build()
        .unwrap();
    let result = run(
        vec![activation_rule(), inhibition],
        &["A", "B"],
        vec![
            Fact::new("A", "activates", EntityId::new("B")),
            Fact::new("A", "inhibits", EntityId::new("B")),
        ],
        EngineConfig::default(),
    );

    assert_eq!(result.status(), RunStatus::Fixpoint);
    let contradictions = result.contradictions();
    assert_eq!(contradictions.len(), 1);

    let entry = &contradictions[0];
    assert_eq!(entry.kind, ContradictionKind::OppositePolarity);
    assert_eq!(entry.round, 1);
    assert!(entry.first.id < entry.second.id);
    assert_eq!(entry.first.fact, Fact::new("B", "active", true));
    assert_eq!(entry.second.fact, Fact::new("B", "active", true).negated());
    assert!(matches!(entry.first.provenance[0].source, ProvenanceSource::Rule { .. }));
    assert!(matches!(entry.second.provenance[0].source, ProvenanceSource::Rule { .. }));

    // Both sides stay in the store.
    assert!(result.contains(&Fact::new("B", "active", true)));
    assert!(result.contains(&Fact::new("B", "active", true).negated()));
}

fn exception_rules() -> Vec<Rule> {
    let mutation_blocks = Rule::builder("mutation_blocks_activation")
        .when(FactPattern::new(var("X"), "activates", var("Y")))
        .requires(FactPattern::new(var("X"), "mutated", Term::value(true)))
        .then(FactPattern::new(var("Y"), "active", Term::value(false)))
        .priority(10)
        .exception_of("activation_marks_target_active")
        .build()
        .unwrap();
    vec![activation_rule(), mutation_blocks]
}

#[test]
fn exception_overrides_base_when_guard_holds() {
    let mutation = Fact::new("A", "mutated", true);
    let result = run(
        exception_rules(),
        &["A", "B"],
        vec![Fact::new("A", "activates", EntityId::new("B")), mutation.clone()],
        EngineConfig::default(),
    );

    assert_eq!(result.status(), RunStatus::Fixpoint);
    assert!(result.contains(&Fact::new("B", "active", false)));
    assert!(!result.contains(&Fact::new("B", "active", true)));
    assert!(result.contradictions().is_empty());

    let suppressions = result.suppressions();
    assert_eq!(suppressions.len(), 1);
    assert_eq!(suppressions[0].rule.as_str(), "activation_marks_target_active");
    assert_eq!(suppressions[0].round, 1);
    assert!(matches!(
        &suppressions[0].outcome,
        RuleOutcome::SuppressedByException { exception, .. } if exception.as_str() == "mutation_blocks_activation"
    ));

    let records = result.explain(&Fact::new("B", "active", false)).unwrap();
    let mutation_id = result.store().find(&mutation).unwrap();
    assert_eq!(records[0].guard_support, vec![mutation_id]);
}

#[test]
fn base_fires_when_exception_guard_fails() {
    let result = run(
        exception_rules(),
        &["A", "B"],
        vec![Fact::new("A", "activates", EntityId::new("B"))],
        EngineConfig::default(),
    );
    assert!(result.contains(&Fact::new("B", "active", true)));
    assert!(!result.contains(&Fact::new("B", "active", false)));
    assert!(result.suppressions().is_empty());
}

const WNT_ENTITIES: &[&str] = &["WNT", "FZD", "DVL", "GSK3B", "BETA_CAT"];

fn wnt_rules() -> Vec<Rule> {
    vec![
        Rule::builder("present_ligand_is_active")
            .when(FactPattern::new(var("X"), "present", Term::value(true)))
            .then(FactPattern::new(var("X"), "active", Term::value(true)))
            .build()
            .unwrap(),
        Rule::builder("active_activator_propagates")
            .when(FactPattern::new(var("X"), "active", Term::value(true)))
            .when(FactPattern::new(var("X"), "activates", var("Y")))
            .then(FactPattern::new(var("Y"), "active", Term::value(true)))
            .build()
            .unwrap(),
        Rule::builder("active_inhibitor_silences")
            .when(FactPattern::new(var("X"), "active", Term::value(true)))
            .when(FactPattern::new(var("X"), "inhibits", var("Y")))
            .then(FactPattern::new(var("Y"), "active", Term::value(false)))
            .build()
            .unwrap(),
        Rule::builder("silenced_inhibitor_releases")
            .when(FactPattern::new(var("X"), "active", Term::value(false)))
            .when(FactPattern::new(var("X"), "inhibits", var("Y")))
            .then(FactPattern::new(var("Y"), "stabilized", Term::value(true)))
            .build()
            .unwrap(),
    ]
}

fn wnt_facts() -> Vec<Fact> {
    vec![
        Fact::new("WNT", "present", true),
        Fact::new("WNT", "activates", EntityId::new("FZD")),
        Fact::new("FZD", "activates", EntityId::new("DVL")),
        Fact::new("DVL", "inhibits", EntityId::new("GSK3B")),
        Fact::new("GSK3B", "inhibits", EntityId::new("BETA_CAT")),
    ]
}

#[test]
fn wnt_cascade_stabilizes_beta_catenin() {
    let result = run(wnt_rules(), WNT_ENTITIES, wnt_facts(), EngineConfig::default());

    assert_eq!(result.status(), RunStatus::Fixpoint);
    assert_eq!(result.rounds(), 6);
    assert_eq!(result.derived().count(), 5);
    assert!(result.contains(&Fact::new("GSK3B", "active", false)));

    let stabilized = Fact::new("BETA_CAT", "stabilized", true);
    let tree = result.derivation_chain(&stabilized).unwrap();
    assert_eq!(tree.round, 5);
    assert_eq!(tree.steps(), 5);
    assert_eq!(tree.depth(), 5);

    let rendered = tree.to_string();
    assert!(rendered.starts_with("#"));
    assert!(rendered.contains("rule silenced_inhibitor_releases, round 5"));
    assert!(rendered.contains("(WNT present true +) [asserted, round 0]"));
}

#[test]
fn wnt_cascade_hits_round_bound() {
    let config = EngineConfig::default().with_max_rounds(3);
    let result = run(wnt_rules(), WNT_ENTITIES, wnt_facts(), config);

    assert_eq!(result.status(), RunStatus::IterationBoundReached);
    assert_eq!(result.rounds(), 3);
    assert!(result.contains(&Fact::new("DVL", "active", true)));
    assert!(!result.contains(&Fact::new("GSK3B", "active", false)));
    assert_eq!(result.to_json().unwrap()["status"], "iteration_bound_reached");
}

#[test]
fn queries_return_bindings_in_id_order() {
    let result = run(wnt_rules(), WNT_ENTITIES, wnt_facts(), EngineConfig::default());
    let answers = result.query(&FactPattern::new(var("S"), "active", Term::value(true)));
    let subjects: Vec<_> = answers.iter().map(|a| a.fact.subject.as_str()).collect();
    assert_eq!(subjects, vec!["WNT", "FZD", "DVL"]);
    assert!(answers.windows(2).all(|w| w[0].id < w[1].id));
}

fn competing_exception_rules() -> RuleSet {
    let base = Rule::builder("ligand_sets_level")
        .when(FactPattern::new(var("X"), "stimulates", var("Y")))
        .then(FactPattern::new(var("Y"), "level", Term::value(Value::Text("up".into()))))
        .build()
        .unwrap();
    let degraded = Rule::builder("degradation_lowers_level")
        .when(FactPattern::new(var("X"), "stimulates", var("Y")))
        .requires(FactPattern::new(var("Y"), "degraded", Term::value(true)))
        .then(FactPattern::new(var("Y"), "level", Term::value(Value::Text("down".into()))))
        .priority(1)
        .exception_of("ligand_sets_level")
        .build()
        .unwrap();
    let saturated = Rule::builder("saturation_caps_level")
        .when(FactPattern::new(var("X"), "stimulates", var("Y")))
        .requires(FactPattern::new(var("Y"), "saturated", Term::value(true)))
        .then(FactPattern::new(var("Y"), "level", Term::value(Value::Text("plateau".into()))))
        .priority(5)
        .exception_of("ligand_sets_level")
        .build()
        .unwrap();
    RuleSet::new(vec![base, degraded, saturated])
        .unwrap()
        .with_exclusive_predicates(["level"])
        .unwrap()
}

fn competing_input() -> Vec<Fact> {
    vec![
        Fact::new("WNT", "stimulates", EntityId::new("BETA_CAT")),
        Fact::new("BETA_CAT", "degraded", true),
        Fact::new("BETA_CAT", "saturated", true),
    ]
}

fn run_with_tie_break(tie_break: ExceptionTieBreak) -> ReasoningResult {
    let config = EngineConfig::default().with_exception_tie_break(tie_break);
    let engine = ReasoningEngine::new(competing_exception_rules(), config).unwrap();
    engine
        .run(&registry(&["WNT", "BETA_CAT"]), competing_input())
        .unwrap()
}

fn level(text: &str) -> Fact {
    Fact::new("BETA_CAT", "level", Value::Text(text.into()))
}

#[test]
fn priority_tie_break_picks_highest_priority_exception() {
    let result = run_with_tie_break(ExceptionTieBreak::PriorityOrder);
    assert!(result.contains(&level("plateau")));
    assert!(!result.contains(&level("down")));
    assert!(!result.contains(&level("up")));
    assert!(result.contradictions().is_empty());
}

#[test]
fn declaration_tie_break_picks_first_declared_exception() {
    let result = run_with_tie_break(ExceptionTieBreak::DeclarationOrder);
    assert!(result.contains(&level("down")));
    assert!(!result.contains(&level("plateau")));
    assert!(result
        .suppressions()
        .iter()
        .any(|s| matches!(&s.outcome, RuleOutcome::SuppressedBySibling { winner, .. } if winner.as_str() == "degradation_lowers_level")));
}

#[test]
fn fire_all_surfaces_exclusive_value_conflict() {
    let result = run_with_tie_break(ExceptionTieBreak::FireAll);
    assert!(result.contains(&level("down")));
    assert!(result.contains(&level("plateau")));
    assert!(!result.contains(&level("up")));

    let contradictions = result.contradictions();
    assert_eq!(contradictions.len(), 1);
    assert_eq!(contradictions[0].kind, ContradictionKind::ExclusiveValues);
}

#[test]
fn typed_entities_and_context_flow_through() {
    let context: bioreasoner::Context = ["HEK293"].into_iter().collect();
    let rule = Rule::builder("contextual_activation")
        .when(FactPattern::new(var("X"), "activates", var("Y")).with_context(context.clone()))
        .then(FactPattern::new(var("Y"), "active", Term::value(true)).with_context(context.clone()))
        .build()
        .unwrap();
    let registry = EntityRegistry::from_entities([
        Entity::typed("A", EntityKind::Protein),
        Entity::typed("B", EntityKind::Protein),
        Entity::typed("HEK293", EntityKind::Custom("cell_line".into())),
    ])
    .unwrap();
    let engine = ReasoningEngine::with_defaults(RuleSet::new(vec![rule]).unwrap());
    let result = engine
        .run(
            &registry,
            vec![
                Fact::new("A", "activates", EntityId::new("B")).with_context(context.clone()),
                Fact::new("B", "activates", EntityId::new("A")),
            ],
        )
        .unwrap();

    assert!(result.contains(&Fact::new("B", "active", true).with_context(context)));
    assert!(!result.contains(&Fact::new("A", "active", true)));
}
