use crate::key::{BindingKey, KeyInterner, Qualifier, TypeArg, TypeRef, Variance};
use rustc_hash::FxHashMap;

#[test]
fn parses_nested_generics_with_variance_and_nullability() {
    let ty = TypeRef::parse("Map<String, out List<in Foo?>>?").unwrap();
    assert_eq!(ty.name, "Map");
    assert!(ty.nullable);
    assert_eq!(ty.args.len(), 2);
    match &ty.args[1] {
        TypeArg::Type { variance, ty } => {
            assert_eq!(*variance, Variance::Out);
            assert_eq!(ty.name, "List");
            match &ty.args[0] {
                TypeArg::Type { variance, ty } => {
                    assert_eq!(*variance, Variance::In);
                    assert!(ty.nullable);
                }
                TypeArg::Star => panic!("expected a type argument"),
            }
        }
        TypeArg::Star => panic!("expected a type argument"),
    }
    assert_eq!(ty.to_string(), "Map<String, out List<in Foo?>>?");
}

#[test]
fn java_wildcards_map_to_variance_and_star() {
    let ty = TypeRef::parse("List<? extends Foo>").unwrap();
    assert!(matches!(
        ty.args[0],
        TypeArg::Type {
            variance: Variance::Out,
            ..
        }
    ));
    let star = TypeRef::parse("List<?>").unwrap();
    assert_eq!(star.args, vec![TypeArg::Star]);
    assert_eq!(star.to_string(), "List<*>");
}

#[test]
fn rejects_malformed_types() {
    assert!(TypeRef::parse("").is_err());
    assert!(TypeRef::parse("List<Foo").is_err());
    assert!(TypeRef::parse("List<Foo>>").is_err());
    let error = TypeRef::parse("Map<,>").unwrap_err();
    assert_eq!(error.position, 4);
}

#[test]
fn canonicalization_strips_variance_but_keeps_star() {
    let aliases = FxHashMap::default();
    let out = TypeRef::parse("List<out Foo>").unwrap().canonicalize(&aliases);
    let plain = TypeRef::parse("List<Foo>").unwrap();
    assert_eq!(out, plain);

    let star = TypeRef::parse("List<*>").unwrap().canonicalize(&aliases);
    assert_ne!(star, plain);
}

#[test]
fn canonicalization_applies_aliases_recursively() {
    let mut aliases = FxHashMap::default();
    aliases.insert("java.lang.Integer".to_string(), "kotlin.Int".to_string());
    let ty = TypeRef::parse("Set<java.lang.Integer>")
        .unwrap()
        .canonicalize(&aliases);
    assert_eq!(ty.to_string(), "Set<kotlin.Int>");
    assert_eq!(ty.simple_name(), "Set");
}

#[test]
fn qualifier_display_and_argument_order() {
    assert_eq!(Qualifier::named("cache-size").to_string(), "@Named(\"cache-size\")");
    let a = Qualifier::new("Tagged").with_arg("b", "2").with_arg("a", "1");
    let b = Qualifier::new("Tagged").with_arg("a", "1").with_arg("b", "2");
    assert_ne!(a, b);
    assert_eq!(a.canonicalize(), b.canonicalize());
    assert_eq!(b.to_string(), "@Tagged(a = \"1\", b = \"2\")");
}

#[test]
fn keys_differ_by_qualifier() {
    let int = BindingKey::parse("Int").unwrap();
    let sized = int.with_qualifier(Qualifier::named("cache-size"));
    assert_ne!(int, sized);
    assert_eq!(sized.to_string(), "@Named(\"cache-size\") Int");
}

#[test]
fn interner_collapses_equivalent_keys() {
    let mut interner = KeyInterner::new();
    let a = interner.intern(BindingKey::parse("List<out Foo>").unwrap());
    let b = interner.intern(BindingKey::parse("List<? extends Foo>").unwrap());
    let c = interner.intern(BindingKey::parse("List<Foo>").unwrap());
    assert_eq!(a, b);
    assert_eq!(b, c);
    assert_eq!(interner.len(), 1);
    assert_eq!(interner.display(a), "List<Foo>");
    assert_eq!(
        interner.lookup(&BindingKey::parse("List<in Foo>").unwrap()),
        Some(a)
    );
    assert_eq!(interner.lookup(&BindingKey::parse("Bar").unwrap()), None);
}

#[test]
fn interner_applies_aliases() {
    let mut aliases = FxHashMap::default();
    aliases.insert("java.lang.Integer".to_string(), "kotlin.Int".to_string());
    let mut interner = KeyInterner::with_aliases(aliases);
    let boxed = interner.intern(BindingKey::parse("java.lang.Integer").unwrap());
    let native = interner.intern(BindingKey::parse("kotlin.Int").unwrap());
    assert_eq!(boxed, native);
}
