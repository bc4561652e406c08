/// How an adapter property is exposed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PropertyKind {
    /// A plain value read on demand.
    Scalar,
    /// A [`vscroll::Reactive`] value observers can subscribe to.
    Reactive,
    /// A method returning a [`crate::MethodPromise`].
    Method,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AdapterProperty {
    pub name: &'static str,
    pub kind: PropertyKind,
    /// Usable before the engine is initialized. Methods called earlier are queued.
    pub permanent: bool,
}

const fn prop(name: &'static str, kind: PropertyKind, permanent: bool) -> AdapterProperty {
    AdapterProperty {
        name,
        kind,
        permanent,
    }
}

/// Every property of [`crate::Adapter`], one row per accessor or command method.
pub static ADAPTER_PROPERTIES: &[AdapterProperty] = &[
    prop("id", PropertyKind::Scalar, true),
    prop("version", PropertyKind::Scalar, true),
    prop("init", PropertyKind::Reactive, true),
    prop("is_loading", PropertyKind::Reactive, false),
    prop("loop_pending", PropertyKind::Reactive, false),
    prop("first_visible", PropertyKind::Reactive, false),
    prop("last_visible", PropertyKind::Reactive, false),
    prop("bof", PropertyKind::Reactive, false),
    prop("eof", PropertyKind::Reactive, false),
    prop("items_count", PropertyKind::Scalar, false),
    prop("buffer_info", PropertyKind::Scalar, false),
    prop("reset", PropertyKind::Method, false),
    prop("reload", PropertyKind::Method, false),
    prop("append", PropertyKind::Method, false),
    prop("prepend", PropertyKind::Method, false),
    prop("check", PropertyKind::Method, false),
    prop("remove", PropertyKind::Method, false),
    prop("clip", PropertyKind::Method, false),
    prop("insert", PropertyKind::Method, false),
    prop("replace", PropertyKind::Method, false),
    prop("update", PropertyKind::Method, false),
    prop("fix", PropertyKind::Method, false),
    prop("relax", PropertyKind::Method, false),
];

/// Looks a property up by name.
pub fn adapter_property(name: &str) -> Option<&'static AdapterProperty> {
    ADAPTER_PROPERTIES.iter().find(|p| p.name == name)
}
