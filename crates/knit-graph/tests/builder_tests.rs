use crate::binding::{BindingKind, ContributionKind, Indirection};
use crate::declarations::{BindingDecl, DeclKind, GraphDecl, KeyDecl};
use crate::test_support::{Fixture, constructor, contribution, provider};
use knit_common::{DeclarationSite, Halt, diagnostic_codes};

#[test]
fn resolves_transitive_dependencies() {
    let graphs = [GraphDecl::new("App", "app.App").requests(KeyDecl::new("A"))];
    let bindings = [
        constructor("A").depends_on(KeyDecl::new("B"), Indirection::Direct),
        provider("App", "B").depends_on(KeyDecl::new("Provider<C>"), Indirection::Direct),
        constructor("C"),
    ];
    let mut fixture = Fixture::new(&graphs, &bindings);
    let graph = fixture.build("App").unwrap();

    assert_eq!(graph.len(), 3);
    let b = graph.get(fixture.key("B")).unwrap();
    assert_eq!(b.kind, BindingKind::Provider);
    // Provider<C> parameters depend on C through a provider.
    assert_eq!(b.dependencies[0].key, fixture.key("C"));
    assert_eq!(b.dependencies[0].indirection, Indirection::ProviderWrapped);
    assert!(fixture.reporter.diagnostics().is_empty());
}

#[test]
fn lazy_parameters_depend_on_the_wrapped_type() {
    let graphs = [GraphDecl::new("App", "app.App").requests(KeyDecl::new("A"))];
    let bindings = [
        constructor("A").depends_on(KeyDecl::new("Lazy<C>"), Indirection::Direct),
        constructor("C"),
    ];
    let mut fixture = Fixture::new(&graphs, &bindings);
    let graph = fixture.build("App").unwrap();

    let a = graph.get(fixture.key("A")).unwrap();
    assert_eq!(a.dependencies.len(), 1);
    assert_eq!(a.dependencies[0].key, fixture.key("C"));
    assert_eq!(a.dependencies[0].indirection, Indirection::LazyWrapped);
    assert!(fixture.reporter.diagnostics().is_empty());
}

#[test]
fn duplicate_providers_skip_the_graph() {
    let graphs = [GraphDecl::new("App", "app.App").requests(KeyDecl::new("Int"))];
    let bindings = [
        provider("App", "Int").at(DeclarationSite::new("A.kt", 1, 1)),
        provider("App", "Int").at(DeclarationSite::new("B.kt", 2, 1)),
    ];
    let mut fixture = Fixture::new(&graphs, &bindings);
    assert_eq!(fixture.reporter.codes(), vec![diagnostic_codes::DUPLICATE_BINDING]);

    let diagnostic = &fixture.reporter.diagnostics()[0];
    assert_eq!(diagnostic.site.as_ref().unwrap().file, "B.kt");
    assert_eq!(diagnostic.related_information.len(), 1);

    assert_eq!(fixture.build("App").unwrap_err(), Halt::SkipGraph);
}

#[test]
fn missing_qualified_binding_reports_the_request_path() {
    let graphs = [GraphDecl::new("App", "app.App").requests(KeyDecl::new("Cache"))];
    let bindings = [provider("App", "Cache").depends_on(
        KeyDecl::new("Int").named("cache-size"),
        Indirection::Direct,
    )];
    let mut fixture = Fixture::new(&graphs, &bindings);
    assert_eq!(fixture.build("App").unwrap_err(), Halt::SkipGraph);

    assert_eq!(fixture.reporter.codes(), vec![diagnostic_codes::MISSING_BINDING]);
    let message = &fixture.reporter.diagnostics()[0].message_text;
    assert!(message.contains("@Named(\"cache-size\") Int"), "{message}");
    assert!(message.contains("App -> Cache"), "{message}");
}

#[test]
fn innermost_declaration_shadows_ancestors() {
    let graphs = [
        GraphDecl::new("App", "app.App"),
        GraphDecl::new("User", "app.User")
            .extends("App")
            .requests(KeyDecl::new("Logger")),
    ];
    let bindings = [provider("App", "Logger"), provider("User", "Logger")];
    let mut fixture = Fixture::new(&graphs, &bindings);
    let graph = fixture.build("User").unwrap();

    let user = fixture.hierarchy.by_name("User").unwrap();
    assert_eq!(graph.get(fixture.key("Logger")).unwrap().owner, Some(user));
    assert!(fixture.reporter.diagnostics().is_empty());
}

#[test]
fn scoped_ancestor_binding_is_an_inherited_leaf() {
    let graphs = [
        GraphDecl::new("App", "app.App").with_scope("Singleton"),
        GraphDecl::new("User", "app.User")
            .extends("App")
            .requests(KeyDecl::new("Db")),
    ];
    let bindings = [
        provider("App", "Db")
            .scoped("Singleton")
            .depends_on(KeyDecl::new("Config"), Indirection::Direct),
        provider("App", "Config"),
    ];
    let mut fixture = Fixture::new(&graphs, &bindings);
    let graph = fixture.build("User").unwrap();

    let app = fixture.hierarchy.by_name("App").unwrap();
    let db = graph.get(fixture.key("Db")).unwrap();
    assert_eq!(db.inherited_from, Some(app));
    assert!(db.dependencies.is_empty());
    assert!(!graph.contains(fixture.key("Config")));
}

#[test]
fn scope_not_declared_by_owner_is_incompatible() {
    let graphs = [GraphDecl::new("App", "app.App").requests(KeyDecl::new("Session"))];
    let bindings = [provider("App", "Session").scoped("UserScope")];
    let mut fixture = Fixture::new(&graphs, &bindings);
    assert_eq!(fixture.build("App").unwrap_err(), Halt::SkipGraph);
    assert_eq!(
        fixture.reporter.codes(),
        vec![diagnostic_codes::INCOMPATIBLY_SCOPED_BINDING]
    );
}

#[test]
fn free_floating_scoped_class_lands_at_the_scope_holder() {
    let graphs = [
        GraphDecl::new("App", "app.App")
            .with_scope("Singleton")
            .requests(KeyDecl::new("Session")),
        GraphDecl::new("User", "app.User")
            .extends("App")
            .with_scope("UserScope")
            .requests(KeyDecl::new("Session")),
    ];
    let bindings = [constructor("Session").scoped("UserScope")];
    let mut fixture = Fixture::new(&graphs, &bindings);

    let graph = fixture.build("User").unwrap();
    let session = graph.get(fixture.key("Session")).unwrap();
    assert_eq!(session.owner, None);
    assert_eq!(session.inherited_from, None);

    // No level on the root's chain declares UserScope.
    assert_eq!(fixture.build("App").unwrap_err(), Halt::SkipGraph);
    assert_eq!(
        fixture.reporter.codes(),
        vec![diagnostic_codes::INCOMPATIBLY_SCOPED_BINDING]
    );
}

#[test]
fn graph_type_resolves_to_the_graph_itself() {
    let graphs = [
        GraphDecl::new("App", "app.App"),
        GraphDecl::new("User", "app.User")
            .extends("App")
            .requests(KeyDecl::new("app.App"))
            .requests(KeyDecl::new("app.User")),
    ];
    let mut fixture = Fixture::new(&graphs, &[]);
    let graph = fixture.build("User").unwrap();

    let app = fixture.hierarchy.by_name("App").unwrap();
    let parent = graph.get(fixture.key("app.App")).unwrap();
    assert_eq!(parent.kind, BindingKind::GraphSelf);
    assert_eq!(parent.inherited_from, Some(app));
    let own = graph.get(fixture.key("app.User")).unwrap();
    assert_eq!(own.inherited_from, None);
    assert!(own.requires_storage());
}

#[test]
fn contributions_are_gathered_under_synthetic_keys() {
    let graphs = [GraphDecl::new("App", "app.App").requests(KeyDecl::new("Set<Int>"))];
    let bindings = [
        contribution("App", "Int", "Set<Int>", ContributionKind::SetElement),
        contribution("App", "Int", "Set<Int>", ContributionKind::SetElement),
    ];
    let mut fixture = Fixture::new(&graphs, &bindings);
    let graph = fixture.build("App").unwrap();

    // Two contributions to the same element type are not duplicates.
    assert!(fixture.reporter.diagnostics().is_empty());
    let pending: Vec<_> = graph.pending_collections().collect();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].contributors.len(), 2);
    assert_ne!(pending[0].contributors[0], pending[0].contributors[1]);
    for &contributor in &pending[0].contributors {
        assert!(graph.get(contributor).unwrap().contribution().is_some());
        assert!(
            fixture
                .interner
                .display(contributor)
                .starts_with("@MultibindingElement(collection = \"Set<Int>\"")
        );
    }
}

#[test]
fn bindings_in_unknown_graphs_are_reported() {
    let graphs = [GraphDecl::new("App", "app.App")];
    let bindings = [provider("Nowhere", "Int")];
    let fixture = Fixture::new(&graphs, &bindings);
    assert_eq!(fixture.reporter.codes(), vec![diagnostic_codes::UNKNOWN_GRAPH]);
    assert!(fixture.index.is_empty());
}

#[test]
fn aliases_need_exactly_one_dependency() {
    let graphs = [GraphDecl::new("App", "app.App")];
    let bindings = [BindingDecl::new(DeclKind::Alias, KeyDecl::new("Repo")).in_graph("App")];
    let fixture = Fixture::new(&graphs, &bindings);
    assert_eq!(fixture.reporter.codes(), vec![diagnostic_codes::INVALID_ALIAS]);
}
