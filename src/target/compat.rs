//! Minimum engine versions per JavaScript syntax feature.
//!
//! Generated from the compat-table data used by esbuild: a feature missing
//! for an engine is treated as unsupported by every version of it.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Engine {
    Chrome,
    Deno,
    Edge,
    /// ECMAScript editions themselves, versioned by year.
    Es,
    Firefox,
    Ios,
    Node,
    Opera,
    Safari,
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Engine::Chrome => "Chrome",
            Engine::Deno => "Deno",
            Engine::Edge => "Edge",
            Engine::Es => "ES",
            Engine::Firefox => "Firefox",
            Engine::Ios => "iOS",
            Engine::Node => "Node",
            Engine::Opera => "Opera",
            Engine::Safari => "Safari",
        };
        f.write_str(name)
    }
}

pub type EngineVersion = [u32; 3];

use Engine::*;

pub static JS_FEATURES: &[(&str, &[(Engine, EngineVersion)])] = &[
    ("ArbitraryModuleNamespaceNames", &[(Chrome, [90, 0, 0]), (Es, [2022, 0, 0]), (Firefox, [87, 0, 0]), (Ios, [14, 5, 0]), (Node, [16, 0, 0]), (Safari, [14, 1, 0])]),
    ("ArraySpread", &[(Chrome, [46, 0, 0]), (Deno, [1, 0, 0]), (Edge, [13, 0, 0]), (Es, [2015, 0, 0]), (Firefox, [36, 0, 0]), (Ios, [10, 0, 0]), (Node, [5, 0, 0]), (Opera, [33, 0, 0]), (Safari, [10, 0, 0])]),
    ("Arrow", &[(Chrome, [49, 0, 0]), (Deno, [1, 0, 0]), (Edge, [13, 0, 0]), (Es, [2015, 0, 0]), (Firefox, [45, 0, 0]), (Ios, [10, 0, 0]), (Node, [6, 0, 0]), (Opera, [36, 0, 0]), (Safari, [10, 0, 0])]),
    ("AsyncAwait", &[(Chrome, [55, 0, 0]), (Deno, [1, 0, 0]), (Edge, [15, 0, 0]), (Es, [2017, 0, 0]), (Firefox, [52, 0, 0]), (Ios, [11, 0, 0]), (Node, [7, 6, 0]), (Opera, [42, 0, 0]), (Safari, [11, 0, 0])]),
    ("AsyncGenerator", &[(Chrome, [63, 0, 0]), (Deno, [1, 0, 0]), (Edge, [79, 0, 0]), (Es, [2018, 0, 0]), (Firefox, [57, 0, 0]), (Ios, [12, 0, 0]), (Node, [10, 0, 0]), (Opera, [50, 0, 0]), (Safari, [12, 0, 0])]),
    ("Bigint", &[(Chrome, [67, 0, 0]), (Deno, [1, 0, 0]), (Edge, [79, 0, 0]), (Es, [2020, 0, 0]), (Firefox, [68, 0, 0]), (Ios, [14, 0, 0]), (Node, [10, 4, 0]), (Opera, [54, 0, 0]), (Safari, [14, 0, 0])]),
    ("Class", &[(Chrome, [49, 0, 0]), (Deno, [1, 0, 0]), (Edge, [13, 0, 0]), (Es, [2015, 0, 0]), (Firefox, [45, 0, 0]), (Ios, [10, 0, 0]), (Node, [6, 0, 0]), (Opera, [36, 0, 0]), (Safari, [10, 0, 0])]),
    ("ClassField", &[(Chrome, [73, 0, 0]), (Deno, [1, 0, 0]), (Edge, [79, 0, 0]), (Es, [2022, 0, 0]), (Firefox, [69, 0, 0]), (Ios, [14, 0, 0]), (Node, [12, 0, 0]), (Opera, [60, 0, 0]), (Safari, [14, 0, 0])]),
    ("ClassPrivateAccessor", &[(Chrome, [84, 0, 0]), (Deno, [1, 0, 0]), (Edge, [84, 0, 0]), (Es, [2022, 0, 0]), (Firefox, [90, 0, 0]), (Ios, [15, 0, 0]), (Node, [14, 6, 0]), (Opera, [70, 0, 0]), (Safari, [15, 0, 0])]),
    ("ClassPrivateBrandCheck", &[(Chrome, [91, 0, 0]), (Deno, [1, 9, 0]), (Edge, [91, 0, 0]), (Es, [2022, 0, 0]), (Firefox, [90, 0, 0]), (Ios, [15, 0, 0]), (Node, [16, 4, 0]), (Opera, [77, 0, 0]), (Safari, [15, 0, 0])]),
    ("ClassPrivateField", &[(Chrome, [84, 0, 0]), (Deno, [1, 0, 0]), (Edge, [84, 0, 0]), (Es, [2022, 0, 0]), (Firefox, [90, 0, 0]), (Ios, [14, 5, 0]), (Node, [14, 6, 0]), (Opera, [70, 0, 0]), (Safari, [14, 1, 0])]),
    ("ClassPrivateMethod", &[(Chrome, [84, 0, 0]), (Deno, [1, 0, 0]), (Edge, [84, 0, 0]), (Es, [2022, 0, 0]), (Firefox, [90, 0, 0]), (Ios, [15, 0, 0]), (Node, [14, 6, 0]), (Opera, [70, 0, 0]), (Safari, [15, 0, 0])]),
    ("ClassPrivateStaticAccessor", &[(Chrome, [84, 0, 0]), (Deno, [1, 0, 0]), (Edge, [84, 0, 0]), (Es, [2022, 0, 0]), (Firefox, [90, 0, 0]), (Ios, [15, 0, 0]), (Node, [14, 6, 0]), (Opera, [70, 0, 0]), (Safari, [15, 0, 0])]),
    ("ClassPrivateStaticField", &[(Chrome, [74, 0, 0]), (Deno, [1, 0, 0]), (Edge, [79, 0, 0]), (Es, [2022, 0, 0]), (Firefox, [90, 0, 0]), (Ios, [14, 5, 0]), (Node, [12, 0, 0]), (Opera, [62, 0, 0]), (Safari, [14, 1, 0])]),
    ("ClassPrivateStaticMethod", &[(Chrome, [84, 0, 0]), (Deno, [1, 0, 0]), (Edge, [84, 0, 0]), (Es, [2022, 0, 0]), (Firefox, [90, 0, 0]), (Ios, [15, 0, 0]), (Node, [14, 6, 0]), (Opera, [70, 0, 0]), (Safari, [15, 0, 0])]),
    ("ClassStaticBlocks", &[(Chrome, [91, 0, 0]), (Deno, [1, 14, 0]), (Edge, [94, 0, 0]), (Es, [2022, 0, 0]), (Firefox, [93, 0, 0]), (Ios, [16, 4, 0]), (Node, [16, 11, 0]), (Opera, [80, 0, 0]), (Safari, [16, 4, 0])]),
    ("ClassStaticField", &[(Chrome, [73, 0, 0]), (Deno, [1, 0, 0]), (Edge, [79, 0, 0]), (Es, [2022, 0, 0]), (Firefox, [75, 0, 0]), (Ios, [14, 5, 0]), (Node, [12, 0, 0]), (Opera, [60, 0, 0]), (Safari, [14, 1, 0])]),
    ("ConstAndLet", &[(Chrome, [49, 0, 0]), (Deno, [1, 0, 0]), (Edge, [14, 0, 0]), (Es, [2015, 0, 0]), (Firefox, [51, 0, 0]), (Ios, [11, 0, 0]), (Node, [6, 0, 0]), (Opera, [36, 0, 0]), (Safari, [11, 0, 0])]),
    ("Decorators", &[(Chrome, [49, 0, 0]), (Deno, [1, 0, 0]), (Edge, [14, 0, 0]), (Es, [2015, 0, 0]), (Firefox, [53, 0, 0]), (Ios, [10, 0, 0]), (Node, [6, 0, 0]), (Opera, [36, 0, 0]), (Safari, [10, 0, 0])]),
    ("Destructuring", &[(Chrome, [51, 0, 0]), (Deno, [1, 0, 0]), (Edge, [18, 0, 0]), (Es, [2015, 0, 0]), (Firefox, [53, 0, 0]), (Ios, [10, 0, 0]), (Node, [6, 5, 0]), (Opera, [38, 0, 0]), (Safari, [10, 0, 0])]),
    ("DynamicImport", &[(Chrome, [63, 0, 0]), (Edge, [79, 0, 0]), (Es, [2015, 0, 0]), (Firefox, [67, 0, 0]), (Ios, [11, 0, 0]), (Node, [13, 2, 0]), (Opera, [50, 0, 0]), (Safari, [11, 1, 0])]),
    ("ExponentOperator", &[(Chrome, [52, 0, 0]), (Deno, [1, 0, 0]), (Edge, [14, 0, 0]), (Es, [2016, 0, 0]), (Firefox, [52, 0, 0]), (Ios, [10, 3, 0]), (Node, [7, 0, 0]), (Opera, [39, 0, 0]), (Safari, [10, 1, 0])]),
    ("ExportStarAs", &[(Chrome, [72, 0, 0]), (Deno, [1, 0, 0]), (Edge, [79, 0, 0]), (Es, [2020, 0, 0]), (Firefox, [80, 0, 0]), (Ios, [14, 5, 0]), (Node, [13, 2, 0]), (Opera, [60, 0, 0]), (Safari, [14, 1, 0])]),
    ("ForAwait", &[(Chrome, [63, 0, 0]), (Deno, [1, 0, 0]), (Edge, [79, 0, 0]), (Es, [2018, 0, 0]), (Firefox, [57, 0, 0]), (Ios, [12, 0, 0]), (Node, [10, 0, 0]), (Opera, [50, 0, 0]), (Safari, [12, 0, 0])]),
    ("ForOf", &[(Chrome, [51, 0, 0]), (Deno, [1, 0, 0]), (Edge, [15, 0, 0]), (Es, [2015, 0, 0]), (Firefox, [53, 0, 0]), (Ios, [10, 0, 0]), (Node, [6, 5, 0]), (Opera, [38, 0, 0]), (Safari, [10, 0, 0])]),
    ("FunctionNameConfigurable", &[(Chrome, [43, 0, 0]), (Deno, [1, 0, 0]), (Edge, [12, 0, 0]), (Es, [2015, 0, 0]), (Firefox, [38, 0, 0]), (Ios, [10, 0, 0]), (Node, [4, 0, 0]), (Opera, [30, 0, 0]), (Safari, [10, 0, 0])]),
    ("FunctionOrClassPropertyAccess", &[(Chrome, [0, 0, 0]), (Deno, [0, 0, 0]), (Edge, [0, 0, 0]), (Es, [0, 0, 0]), (Firefox, [0, 0, 0]), (Ios, [0, 0, 0]), (Node, [0, 0, 0]), (Opera, [0, 0, 0]), (Safari, [16, 3, 0])]),
    ("Generator", &[(Chrome, [50, 0, 0]), (Deno, [1, 0, 0]), (Edge, [13, 0, 0]), (Es, [2015, 0, 0]), (Firefox, [53, 0, 0]), (Ios, [10, 0, 0]), (Node, [6, 0, 0]), (Opera, [37, 0, 0]), (Safari, [10, 0, 0])]),
    ("Hashbang", &[(Chrome, [74, 0, 0]), (Deno, [1, 0, 0]), (Edge, [79, 0, 0]), (Firefox, [67, 0, 0]), (Ios, [13, 4, 0]), (Node, [12, 5, 0]), (Opera, [62, 0, 0]), (Safari, [13, 1, 0])]),
    ("ImportAssertions", &[(Chrome, [91, 0, 0]), (Deno, [1, 17, 0]), (Edge, [91, 0, 0]), (Node, [16, 14, 0])]),
    ("ImportAttributes", &[(Deno, [1, 37, 0]), (Node, [20, 10, 0])]),
    ("ImportMeta", &[(Chrome, [64, 0, 0]), (Deno, [1, 0, 0]), (Edge, [79, 0, 0]), (Es, [2020, 0, 0]), (Firefox, [62, 0, 0]), (Ios, [12, 0, 0]), (Node, [10, 4, 0]), (Opera, [51, 0, 0]), (Safari, [11, 1, 0])]),
    ("InlineScript", &[(Chrome, [85, 0, 0]), (Deno, [1, 2, 0]), (Edge, [85, 0, 0]), (Es, [2021, 0, 0]), (Firefox, [79, 0, 0]), (Ios, [14, 0, 0]), (Node, [15, 0, 0]), (Opera, [71, 0, 0]), (Safari, [14, 0, 0])]),
    ("NestedRestBinding", &[(Chrome, [49, 0, 0]), (Deno, [1, 0, 0]), (Edge, [14, 0, 0]), (Es, [2016, 0, 0]), (Firefox, [47, 0, 0]), (Ios, [10, 3, 0]), (Node, [6, 0, 0]), (Opera, [36, 0, 0]), (Safari, [10, 1, 0])]),
    ("NewTarget", &[(Chrome, [46, 0, 0]), (Deno, [1, 0, 0]), (Edge, [14, 0, 0]), (Es, [2015, 0, 0]), (Firefox, [41, 0, 0]), (Ios, [10, 0, 0]), (Node, [5, 0, 0]), (Opera, [33, 0, 0]), (Safari, [10, 0, 0])]),
    ("NodeColonPrefixImport", &[(Node, [14, 13, 1])]),
    ("NodeColonPrefixRequire", &[(Node, [16, 0, 0])]),
    ("NullishCoalescing", &[(Chrome, [80, 0, 0]), (Deno, [1, 0, 0]), (Edge, [80, 0, 0]), (Es, [2020, 0, 0]), (Firefox, [72, 0, 0]), (Ios, [13, 4, 0]), (Node, [14, 0, 0]), (Opera, [67, 0, 0]), (Safari, [13, 1, 0])]),
    ("ObjectAccessors", &[(Chrome, [5, 0, 0]), (Deno, [1, 0, 0]), (Edge, [12, 0, 0]), (Es, [5, 0, 0]), (Firefox, [2, 0, 0]), (Ios, [6, 0, 0]), (Node, [0, 4, 0]), (Opera, [10, 10, 0]), (Safari, [3, 1, 0])]),
    ("ObjectExtensions", &[(Chrome, [44, 0, 0]), (Deno, [1, 0, 0]), (Edge, [12, 0, 0]), (Es, [2015, 0, 0]), (Firefox, [34, 0, 0]), (Ios, [10, 0, 0]), (Node, [4, 0, 0]), (Opera, [31, 0, 0]), (Safari, [10, 0, 0])]),
    ("ObjectRestSpread", &[(Chrome, [60, 0, 0]), (Deno, [1, 0, 0]), (Edge, [79, 0, 0]), (Es, [2018, 0, 0]), (Firefox, [55, 0, 0]), (Ios, [11, 3, 0]), (Node, [8, 3, 0]), (Opera, [47, 0, 0]), (Safari, [11, 1, 0])]),
    ("OptionalCatchBinding", &[(Chrome, [66, 0, 0]), (Deno, [1, 0, 0]), (Edge, [79, 0, 0]), (Es, [2019, 0, 0]), (Firefox, [58, 0, 0]), (Ios, [11, 3, 0]), (Node, [10, 0, 0]), (Opera, [53, 0, 0]), (Safari, [11, 1, 0])]),
    ("OptionalChain", &[(Chrome, [91, 0, 0]), (Deno, [1, 9, 0]), (Edge, [91, 0, 0]), (Es, [2020, 0, 0]), (Firefox, [74, 0, 0]), (Ios, [13, 4, 0]), (Node, [16, 1, 0]), (Opera, [77, 0, 0]), (Safari, [13, 1, 0])]),
    ("RegexpDotAllFlag", &[(Chrome, [62, 0, 0]), (Deno, [1, 0, 0]), (Edge, [79, 0, 0]), (Es, [2018, 0, 0]), (Firefox, [78, 0, 0]), (Ios, [11, 3, 0]), (Node, [8, 10, 0]), (Opera, [49, 0, 0]), (Safari, [11, 1, 0])]),
    ("RegexpLookbehindAssertions", &[(Chrome, [62, 0, 0]), (Deno, [1, 0, 0]), (Edge, [79, 0, 0]), (Es, [2018, 0, 0]), (Firefox, [78, 0, 0]), (Ios, [16, 4, 0]), (Node, [8, 10, 0]), (Opera, [49, 0, 0]), (Safari, [16, 4, 0])]),
    ("RegexpMatchIndices", &[(Chrome, [90, 0, 0]), (Deno, [1, 8, 0]), (Edge, [90, 0, 0]), (Es, [2022, 0, 0]), (Firefox, [88, 0, 0]), (Ios, [15, 0, 0]), (Node, [16, 0, 0]), (Opera, [76, 0, 0]), (Safari, [15, 0, 0])]),
    ("RegexpNamedCaptureGroups", &[(Chrome, [64, 0, 0]), (Deno, [1, 0, 0]), (Edge, [79, 0, 0]), (Es, [2018, 0, 0]), (Firefox, [78, 0, 0]), (Ios, [11, 3, 0]), (Node, [10, 0, 0]), (Opera, [51, 0, 0]), (Safari, [11, 1, 0])]),
    ("RegexpSetNotation", &[(Chrome, [50, 0, 0]), (Deno, [1, 0, 0]), (Edge, [13, 0, 0]), (Es, [2015, 0, 0]), (Firefox, [46, 0, 0]), (Ios, [12, 0, 0]), (Node, [6, 0, 0]), (Opera, [37, 0, 0]), (Safari, [12, 0, 0])]),
    ("RegexpUnicodePropertyEscapes", &[(Es, [2018, 0, 0]), (Node, [21, 3, 0])]),
    ("RestArgument", &[(Chrome, [47, 0, 0]), (Deno, [1, 0, 0]), (Edge, [12, 0, 0]), (Es, [2015, 0, 0]), (Firefox, [43, 0, 0]), (Ios, [10, 0, 0]), (Node, [6, 0, 0]), (Opera, [34, 0, 0]), (Safari, [10, 0, 0])]),
    ("TemplateLiteral", &[(Chrome, [41, 0, 0]), (Deno, [1, 0, 0]), (Edge, [13, 0, 0]), (Es, [2015, 0, 0]), (Firefox, [34, 0, 0]), (Ios, [13, 0, 0]), (Node, [10, 0, 0]), (Opera, [28, 0, 0]), (Safari, [13, 0, 0])]),
    ("TopLevelAwait", &[(Chrome, [89, 0, 0]), (Deno, [1, 0, 0]), (Edge, [89, 0, 0]), (Es, [2022, 0, 0]), (Firefox, [89, 0, 0]), (Ios, [15, 0, 0]), (Node, [14, 8, 0]), (Opera, [75, 0, 0]), (Safari, [15, 0, 0])]),
    ("TypeofExoticObjectIsObject", &[(Chrome, [0, 0, 0]), (Deno, [0, 0, 0]), (Edge, [0, 0, 0]), (Es, [2020, 0, 0]), (Firefox, [0, 0, 0]), (Ios, [0, 0, 0]), (Node, [0, 0, 0]), (Opera, [0, 0, 0]), (Safari, [0, 0, 0])]),
    ("UnicodeEscapes", &[(Chrome, [44, 0, 0]), (Deno, [1, 0, 0]), (Edge, [12, 0, 0]), (Es, [2015, 0, 0]), (Firefox, [53, 0, 0]), (Ios, [9, 0, 0]), (Node, [4, 0, 0]), (Opera, [31, 0, 0]), (Safari, [9, 0, 0])]),
    ("Using", &[]),
];

/// Names of the features `engine` at `version` cannot run.
pub fn unsupported_features(engine: Engine, version: EngineVersion) -> Vec<&'static str> {
    JS_FEATURES
        .iter()
        .filter(|(_, support)| {
            match support.iter().find(|(candidate, _)| *candidate == engine) {
                Some((_, minimum)) => *minimum > version,
                None => true,
            }
        })
        .map(|(name, _)| *name)
        .collect()
}
