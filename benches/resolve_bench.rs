//! Resolution benchmarks.
//!
//! Synthetic hierarchies: wide (many sibling graphs reading a shared
//! scoped chain from the root) and deep (a long extension chain where each
//! level consumes a key owned by its parent).

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use knit::{
    BindingDecl, DeclKind, Declarations, DiagnosticCollector, GraphDecl, Indirection, KeyDecl,
};

fn service(index: usize) -> String {
    format!("com.app.Service{index}")
}

/// A root graph owning a scoped dependency chain of `chain` services, with
/// `children` nested graphs that each request the end of the chain.
fn wide(children: usize, chain: usize) -> Declarations {
    let mut graphs = vec![GraphDecl::new("App", "app.App").with_scope("Singleton")];
    for child in 0..children {
        graphs.push(
            GraphDecl::new(format!("Child{child}"), format!("app.Child{child}"))
                .extends("App")
                .requests(KeyDecl::new(service(chain - 1))),
        );
    }

    let mut bindings = Vec::with_capacity(chain);
    for index in 0..chain {
        let mut binding =
            BindingDecl::new(DeclKind::Constructor, KeyDecl::new(service(index))).scoped("Singleton");
        if index > 0 {
            binding = binding.depends_on(KeyDecl::new(service(index - 1)), Indirection::Direct);
        }
        bindings.push(binding);
    }

    Declarations {
        graphs,
        bindings,
        ..Declarations::default()
    }
}

/// An extension chain of `depth` graphs; level `n` scopes `Service{n}`,
/// which depends on the service of the level above.
fn deep(depth: usize) -> Declarations {
    let mut graphs = Vec::with_capacity(depth);
    let mut bindings = Vec::with_capacity(depth);
    for level in 0..depth {
        let mut graph = GraphDecl::new(format!("G{level}"), format!("app.G{level}"))
            .with_scope(format!("Scope{level}"))
            .requests(KeyDecl::new(service(level)));
        if level > 0 {
            graph = graph.extends(format!("G{}", level - 1));
        }
        graphs.push(graph);

        let mut binding = BindingDecl::new(DeclKind::Constructor, KeyDecl::new(service(level)))
            .scoped(format!("Scope{level}"));
        if level > 0 {
            binding = binding.depends_on(KeyDecl::new(service(level - 1)), Indirection::Direct);
        }
        bindings.push(binding);
    }

    Declarations {
        graphs,
        bindings,
        ..Declarations::default()
    }
}

fn bench_wide(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve_wide");
    for children in [1usize, 16, 128] {
        let declarations = wide(children, 32);
        group.bench_with_input(
            BenchmarkId::from_parameter(children),
            &declarations,
            |b, declarations| {
                b.iter(|| {
                    let mut diagnostics = DiagnosticCollector::new();
                    black_box(knit::resolve(black_box(declarations), &mut diagnostics))
                });
            },
        );
    }
    group.finish();
}

fn bench_deep(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve_deep");
    for depth in [4usize, 16, 48] {
        let declarations = deep(depth);
        group.bench_with_input(
            BenchmarkId::from_parameter(depth),
            &declarations,
            |b, declarations| {
                b.iter(|| {
                    let mut diagnostics = DiagnosticCollector::new();
                    black_box(knit::resolve(black_box(declarations), &mut diagnostics))
                });
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_wide, bench_deep);
criterion_main!(benches);
