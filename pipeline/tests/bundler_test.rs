//! Bundling over the virtual file set.

use pipeline::files::FileSet;
use pipeline::{BundleConfig, BundleErrorKind, BundleStrategy, Bundler};

const LEAF: &str = "export default function Leaf() { return <span>leaf</span>; }\n";

#[test]
fn test_entry_precedence() {
    let bundler = Bundler::default();

    let both = FileSet::from_map([("main.tsx", LEAF), ("index.tsx", LEAF), ("App.tsx", LEAF)]);
    assert_eq!(bundler.detect_entry(&both, None).unwrap(), "main.tsx");

    let nested = FileSet::from_map([("index.tsx", LEAF), ("src/main.tsx", LEAF)]);
    assert_eq!(bundler.detect_entry(&nested, None).unwrap(), "src/main.tsx");

    let index_only = FileSet::from_map([("src/index.tsx", LEAF), ("src/App.tsx", LEAF)]);
    assert_eq!(bundler.detect_entry(&index_only, None).unwrap(), "src/index.tsx");

    let app_only = FileSet::from_map([("App.tsx", LEAF)]);
    assert_eq!(bundler.detect_entry(&app_only, None).unwrap(), "App.tsx");

    // An override present in the set wins; an absent one falls back.
    assert_eq!(bundler.detect_entry(&both, Some("App.tsx")).unwrap(), "App.tsx");
    assert_eq!(bundler.detect_entry(&both, Some("nope.tsx")).unwrap(), "main.tsx");
}

#[test]
fn test_missing_entry_is_resolution_failure() {
    let files = FileSet::from_map([("src/components/Leaf.tsx", LEAF)]);
    let err = Bundler::default().bundle(&files, None).unwrap_err();
    assert_eq!(err.kind, BundleErrorKind::ResolutionFailure);
    assert!(err.message.contains("main.tsx"));
}

#[test]
fn test_externals_never_bundled() {
    let files = FileSet::from_map([
        (
            "src/main.tsx",
            "import React from 'react';\nimport { createRoot } from 'react-dom/client';\nimport App from './App';\ncreateRoot(document.getElementById('root')!).render(<App />);\n",
        ),
        (
            "src/App.tsx",
            "import { Star } from 'lucide-react';\nimport { helper } from './missing';\nimport { Leaf } from '@/components/Leaf';\nexport default function App() { return <div><Star /><Leaf />{helper}</div>; }\n",
        ),
        (
            "src/components/Leaf.tsx",
            "export function Leaf() { return <span>leaf</span>; }\n",
        ),
    ]);

    let artifact = Bundler::default().bundle(&files, None).unwrap();
    assert_eq!(artifact.entry_point, "src/main.tsx");
    assert_eq!(
        artifact.modules,
        vec!["src/main.tsx", "src/App.tsx", "src/components/Leaf.tsx"]
    );
    for external in ["react", "react-dom/client", "lucide-react", "./missing"] {
        assert!(
            artifact.externalized.iter().any(|e| e == external),
            "{} not externalized: {:?}",
            external,
            artifact.externalized
        );
        assert!(!artifact.modules.iter().any(|m| m == external));
    }

    let code = artifact.code().unwrap();
    assert!(code.contains("__PREVIEW_ENTRY__"));
    assert!(code.contains("React.createElement"));
    assert!(!code.contains("import "));
}

#[test]
fn test_compile_failure_has_no_artifact() {
    let files = FileSet::from_map([
        ("main.tsx", "import Broken from './Broken';\nexport default Broken;\n"),
        ("Broken.tsx", "export const = ;\n"),
    ]);
    let err = Bundler::default().bundle(&files, None).unwrap_err();
    assert_eq!(err.kind, BundleErrorKind::CompileFailure);
    assert_eq!(err.file.as_deref(), Some("Broken.tsx"));
}

#[test]
fn test_non_code_modules() {
    let files = FileSet::from_map([
        (
            "main.tsx",
            "import './index.css';\nimport data from './data.json';\nexport default function App() { return <p>{data.title}</p>; }\n",
        ),
        ("index.css", "body { margin: 0; }"),
        ("data.json", "{\"title\": \"Hello\"}"),
    ]);
    let artifact = Bundler::default().bundle(&files, None).unwrap();
    assert_eq!(artifact.modules.len(), 3);
    let code = artifact.code().unwrap();
    assert!(code.contains("__injectStyle"));
    assert!(code.contains("\"Hello\""));
}

#[test]
fn test_file_map_strategy() {
    let files = FileSet::from_map([
        (
            "package.json",
            "{\"dependencies\": {\"react\": \"^18.2.0\", \"lucide-react\": \"0.300.0\"}}",
        ),
        (
            "src/main.tsx",
            "import React from 'react';\nimport { Star } from 'lucide-react';\nimport { Leaf } from './Leaf';\nexport default () => <><Star /><Leaf /></>;\n",
        ),
        ("src/Leaf.tsx", "export function Leaf() { return <i />; }\n"),
        ("src/unused.tsx", LEAF),
    ]);
    let bundler = Bundler::new(BundleConfig {
        strategy: BundleStrategy::FileMap,
        ..BundleConfig::default()
    });
    let artifact = bundler.bundle(&files, None).unwrap();
    assert_eq!(artifact.strategy(), BundleStrategy::FileMap);
    assert!(artifact.code().is_none());

    let json = serde_json::to_value(&artifact).unwrap();
    assert_eq!(json["strategy"], "file_map");
    assert_eq!(json["entryPoint"], "src/main.tsx");
    assert!(json["files"]["src/Leaf.tsx"].is_string());
    assert!(json["files"]["src/unused.tsx"].is_null());
    assert_eq!(json["dependencies"]["react"], "^18.2.0");
    assert_eq!(json["dependencies"]["lucide-react"], "0.300.0");
}

#[test]
fn test_file_map_rejects_missing_project_imports() {
    let bundler = Bundler::new(BundleConfig {
        strategy: BundleStrategy::FileMap,
        ..BundleConfig::default()
    });

    for (import, specifier) in [
        ("import Missing from './Missing';", "./Missing"),
        ("import { useThing } from '@/hooks/useThing';", "@/hooks/useThing"),
    ] {
        let files = FileSet::from_map([
            ("src/main.tsx", "import App from './App';\nexport default App;\n".to_string()),
            (
                "src/App.tsx",
                format!("import React from 'react';\n{}\nexport default function App() {{ return <div />; }}\n", import),
            ),
        ]);
        let err = bundler.bundle(&files, None).unwrap_err();
        assert_eq!(err.kind, BundleErrorKind::ResolutionFailure);
        assert_eq!(err.file.as_deref(), Some("src/App.tsx"));
        assert!(err.message.contains(specifier), "{}", err.message);
    }
}
