//! Built-in reference catalog
//!
//! A minimal slice of the core library: the types a port usually meets in
//! base lists and attributes, plus the virtual inheritance marker. Base
//! lists are written in C# syntax and bound like source bases.

use super::syntax::TypeKind;

#[derive(Debug, Clone, Copy)]
pub struct CatalogType {
    pub namespace: &'static str,
    pub name: &'static str,
    pub type_params: &'static [&'static str],
    pub kind: TypeKind,
    /// Keyword alias used for display (`int` for `System.Int32`)
    pub keyword: Option<&'static str>,
    pub bases: &'static [&'static str],
}

impl CatalogType {
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.namespace, self.name)
    }
}

const fn class(namespace: &'static str, name: &'static str, bases: &'static [&'static str]) -> CatalogType {
    CatalogType {
        namespace,
        name,
        type_params: &[],
        kind: TypeKind::Class,
        keyword: None,
        bases,
    }
}

const fn interface(namespace: &'static str, name: &'static str, bases: &'static [&'static str]) -> CatalogType {
    CatalogType {
        namespace,
        name,
        type_params: &[],
        kind: TypeKind::Interface,
        keyword: None,
        bases,
    }
}

const fn generic(
    kind: TypeKind,
    namespace: &'static str,
    name: &'static str,
    type_params: &'static [&'static str],
    bases: &'static [&'static str],
) -> CatalogType {
    CatalogType {
        namespace,
        name,
        type_params,
        kind,
        keyword: None,
        bases,
    }
}

const fn primitive(name: &'static str, keyword: &'static str, bases: &'static [&'static str]) -> CatalogType {
    CatalogType {
        namespace: "System",
        name,
        type_params: &[],
        kind: TypeKind::Struct,
        keyword: Some(keyword),
        bases,
    }
}

const NUMERIC_BASES: &[&str] = &["System.IComparable", "System.IConvertible", "System.IFormattable"];

pub const CATALOG: &[CatalogType] = &[
    // System
    CatalogType {
        namespace: "System",
        name: "Object",
        type_params: &[],
        kind: TypeKind::Class,
        keyword: Some("object"),
        bases: &[],
    },
    CatalogType {
        namespace: "System",
        name: "String",
        type_params: &[],
        kind: TypeKind::Class,
        keyword: Some("string"),
        bases: &[
            "System.IComparable",
            "System.ICloneable",
            "System.IConvertible",
            "System.IComparable<string>",
            "System.Collections.Generic.IEnumerable<char>",
            "System.IEquatable<string>",
        ],
    },
    primitive("Boolean", "bool", &["System.IComparable", "System.IConvertible"]),
    primitive("Byte", "byte", NUMERIC_BASES),
    primitive("SByte", "sbyte", NUMERIC_BASES),
    primitive("Char", "char", &["System.IComparable", "System.IConvertible"]),
    primitive("Decimal", "decimal", NUMERIC_BASES),
    primitive("Double", "double", NUMERIC_BASES),
    primitive("Single", "float", NUMERIC_BASES),
    primitive("Int16", "short", NUMERIC_BASES),
    primitive("UInt16", "ushort", NUMERIC_BASES),
    primitive("Int32", "int", NUMERIC_BASES),
    primitive("UInt32", "uint", NUMERIC_BASES),
    primitive("Int64", "long", NUMERIC_BASES),
    primitive("UInt64", "ulong", NUMERIC_BASES),
    CatalogType {
        namespace: "System",
        name: "Void",
        type_params: &[],
        kind: TypeKind::Struct,
        keyword: Some("void"),
        bases: &[],
    },
    class("System", "ValueType", &[]),
    class("System", "Enum", &["System.IComparable", "System.IConvertible", "System.IFormattable"]),
    class("System", "Array", &["System.ICloneable", "System.Collections.IList"]),
    class("System", "Delegate", &["System.ICloneable"]),
    class("System", "MulticastDelegate", &[]),
    class("System", "Type", &[]),
    class("System", "Attribute", &[]),
    class("System", "Exception", &[]),
    class("System", "SystemException", &[]),
    class("System", "ArgumentException", &[]),
    class("System", "InvalidOperationException", &[]),
    class("System", "NotSupportedException", &[]),
    class("System", "NotImplementedException", &[]),
    class("System", "EventArgs", &[]),
    class("System", "Console", &[]),
    class("System", "Math", &[]),
    class("System", "SerializableAttribute", &[]),
    class("System", "ObsoleteAttribute", &[]),
    class("System", "FlagsAttribute", &[]),
    class("System", "AttributeUsageAttribute", &[]),
    class("System", "CLSCompliantAttribute", &[]),
    interface("System", "IDisposable", &[]),
    interface("System", "IAsyncDisposable", &[]),
    interface("System", "ICloneable", &[]),
    interface("System", "IComparable", &[]),
    interface("System", "IConvertible", &[]),
    interface("System", "IFormattable", &[]),
    interface("System", "IFormatProvider", &[]),
    interface("System", "IServiceProvider", &[]),
    interface("System", "ISpanFormattable", &["System.IFormattable"]),
    generic(TypeKind::Interface, "System", "IComparable", &["T"], &[]),
    generic(TypeKind::Interface, "System", "IEquatable", &["T"], &[]),
    generic(TypeKind::Interface, "System", "IObservable", &["T"], &[]),
    generic(TypeKind::Interface, "System", "IObserver", &["T"], &[]),
    generic(TypeKind::Interface, "System", "IProgress", &["T"], &[]),
    generic(TypeKind::Struct, "System", "Nullable", &["T"], &[]),
    generic(TypeKind::Class, "System", "Lazy", &["T"], &[]),
    // System.Collections
    interface("System.Collections", "IEnumerable", &[]),
    interface("System.Collections", "IEnumerator", &[]),
    interface("System.Collections", "ICollection", &["System.Collections.IEnumerable"]),
    interface(
        "System.Collections",
        "IList",
        &["System.Collections.ICollection", "System.Collections.IEnumerable"],
    ),
    interface(
        "System.Collections",
        "IDictionary",
        &["System.Collections.ICollection", "System.Collections.IEnumerable"],
    ),
    interface("System.Collections", "IComparer", &[]),
    interface("System.Collections", "IEqualityComparer", &[]),
    interface("System.Collections", "IStructuralEquatable", &[]),
    interface("System.Collections", "IStructuralComparable", &[]),
    class(
        "System.Collections",
        "ArrayList",
        &["System.Collections.IList", "System.ICloneable"],
    ),
    class(
        "System.Collections",
        "Hashtable",
        &["System.Collections.IDictionary", "System.ICloneable"],
    ),
    // System.Collections.Generic
    generic(
        TypeKind::Interface,
        "System.Collections.Generic",
        "IEnumerable",
        &["T"],
        &["System.Collections.IEnumerable"],
    ),
    generic(
        TypeKind::Interface,
        "System.Collections.Generic",
        "IEnumerator",
        &["T"],
        &["System.IDisposable", "System.Collections.IEnumerator"],
    ),
    generic(
        TypeKind::Interface,
        "System.Collections.Generic",
        "ICollection",
        &["T"],
        &["System.Collections.Generic.IEnumerable<T>", "System.Collections.IEnumerable"],
    ),
    generic(
        TypeKind::Interface,
        "System.Collections.Generic",
        "IList",
        &["T"],
        &[
            "System.Collections.Generic.ICollection<T>",
            "System.Collections.Generic.IEnumerable<T>",
            "System.Collections.IEnumerable",
        ],
    ),
    generic(
        TypeKind::Interface,
        "System.Collections.Generic",
        "ISet",
        &["T"],
        &[
            "System.Collections.Generic.ICollection<T>",
            "System.Collections.Generic.IEnumerable<T>",
            "System.Collections.IEnumerable",
        ],
    ),
    generic(
        TypeKind::Interface,
        "System.Collections.Generic",
        "IReadOnlyCollection",
        &["T"],
        &["System.Collections.Generic.IEnumerable<T>", "System.Collections.IEnumerable"],
    ),
    generic(
        TypeKind::Interface,
        "System.Collections.Generic",
        "IReadOnlyList",
        &["T"],
        &[
            "System.Collections.Generic.IReadOnlyCollection<T>",
            "System.Collections.Generic.IEnumerable<T>",
            "System.Collections.IEnumerable",
        ],
    ),
    generic(
        TypeKind::Interface,
        "System.Collections.Generic",
        "IDictionary",
        &["TKey", "TValue"],
        &[
            "System.Collections.Generic.ICollection<System.Collections.Generic.KeyValuePair<TKey, TValue>>",
            "System.Collections.Generic.IEnumerable<System.Collections.Generic.KeyValuePair<TKey, TValue>>",
            "System.Collections.IEnumerable",
        ],
    ),
    generic(
        TypeKind::Interface,
        "System.Collections.Generic",
        "IReadOnlyDictionary",
        &["TKey", "TValue"],
        &[
            "System.Collections.Generic.IReadOnlyCollection<System.Collections.Generic.KeyValuePair<TKey, TValue>>",
            "System.Collections.Generic.IEnumerable<System.Collections.Generic.KeyValuePair<TKey, TValue>>",
            "System.Collections.IEnumerable",
        ],
    ),
    generic(TypeKind::Interface, "System.Collections.Generic", "IComparer", &["T"], &[]),
    generic(TypeKind::Interface, "System.Collections.Generic", "IEqualityComparer", &["T"], &[]),
    generic(
        TypeKind::Interface,
        "System.Collections.Generic",
        "IAsyncEnumerable",
        &["T"],
        &[],
    ),
    generic(
        TypeKind::Struct,
        "System.Collections.Generic",
        "KeyValuePair",
        &["TKey", "TValue"],
        &[],
    ),
    generic(
        TypeKind::Class,
        "System.Collections.Generic",
        "List",
        &["T"],
        &[
            "System.Collections.Generic.IList<T>",
            "System.Collections.IList",
            "System.Collections.Generic.IReadOnlyList<T>",
        ],
    ),
    generic(
        TypeKind::Class,
        "System.Collections.Generic",
        "Dictionary",
        &["TKey", "TValue"],
        &[
            "System.Collections.Generic.IDictionary<TKey, TValue>",
            "System.Collections.IDictionary",
            "System.Collections.Generic.IReadOnlyDictionary<TKey, TValue>",
        ],
    ),
    generic(
        TypeKind::Class,
        "System.Collections.Generic",
        "HashSet",
        &["T"],
        &["System.Collections.Generic.ISet<T>", "System.Collections.Generic.IReadOnlyCollection<T>"],
    ),
    // System.Linq
    interface("System.Linq", "IQueryable", &["System.Collections.IEnumerable"]),
    generic(
        TypeKind::Interface,
        "System.Linq",
        "IQueryable",
        &["T"],
        &[
            "System.Collections.Generic.IEnumerable<T>",
            "System.Collections.IEnumerable",
            "System.Linq.IQueryable",
        ],
    ),
    generic(
        TypeKind::Interface,
        "System.Linq",
        "IGrouping",
        &["TKey", "TElement"],
        &["System.Collections.Generic.IEnumerable<TElement>", "System.Collections.IEnumerable"],
    ),
    generic(
        TypeKind::Interface,
        "System.Linq",
        "IOrderedEnumerable",
        &["T"],
        &["System.Collections.Generic.IEnumerable<T>", "System.Collections.IEnumerable"],
    ),
    class("System.Linq", "Enumerable", &[]),
    // System.ComponentModel
    interface("System.ComponentModel", "INotifyPropertyChanged", &[]),
    interface("System.ComponentModel", "INotifyPropertyChanging", &[]),
    // System.Runtime.Serialization
    interface("System.Runtime.Serialization", "ISerializable", &[]),
    // System.IO
    class("System.IO", "Stream", &["System.IDisposable", "System.IAsyncDisposable"]),
    class("System.IO", "TextReader", &["System.IDisposable"]),
    class("System.IO", "TextWriter", &["System.IDisposable", "System.IAsyncDisposable"]),
    // System.Text
    class("System.Text", "StringBuilder", &["System.Runtime.Serialization.ISerializable"]),
    // System.Threading.Tasks
    class("System.Threading.Tasks", "Task", &["System.IDisposable"]),
    generic(TypeKind::Class, "System.Threading.Tasks", "Task", &["TResult"], &[]),
    // Porter markers
    class("CsToCppPorter", "CppVirtualInheritance", &["System.Attribute"]),
];

/// Namespaces that hold catalog types, parents included
pub fn catalog_namespaces() -> Vec<String> {
    let mut namespaces: Vec<String> = Vec::new();
    for entry in CATALOG {
        let mut prefix = String::new();
        for segment in entry.namespace.split('.') {
            if !prefix.is_empty() {
                prefix.push('.');
            }
            prefix.push_str(segment);
            if !namespaces.contains(&prefix) {
                namespaces.push(prefix.clone());
            }
        }
    }
    namespaces
}

/// Catalog qualified name behind a predefined type keyword
pub fn keyword_type(keyword: &str) -> Option<&'static str> {
    let name = match keyword {
        "bool" => "System.Boolean",
        "byte" => "System.Byte",
        "sbyte" => "System.SByte",
        "char" => "System.Char",
        "decimal" => "System.Decimal",
        "double" => "System.Double",
        "float" => "System.Single",
        "int" => "System.Int32",
        "uint" => "System.UInt32",
        "long" => "System.Int64",
        "ulong" => "System.UInt64",
        "short" => "System.Int16",
        "ushort" => "System.UInt16",
        "object" | "dynamic" => "System.Object",
        "string" => "System.String",
        "void" => "System.Void",
        _ => return None,
    };
    Some(name)
}
