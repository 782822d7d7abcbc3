use std::{
    cell::Cell,
    error::Error,
    fs,
    io::{self, Cursor, Read},
    path::Path,
    rc::Rc,
};

use xslinc::{
    error::{ErrorKind, HandlerError, IncludeError, StylesheetError},
    io::{InputSource, XmlInputCallback, path_to_uri, register_input_callbacks},
    parser::{XmlReader, XmlStreamReader},
    processor::{
        DirectiveKind, IncludeContext, InclusionDirective, ProcessorConfig, ProcessorOption,
        StylesheetHandler, StylesheetType, process_include,
    },
    resolver::UriResolver,
    sax::{Attribute, ContentHandler},
    tree::Node,
};

const XSL_NS: &str = "http://www.w3.org/1999/XSL/Transform";

fn stylesheet(body: &str) -> String {
    format!("<?xml version=\"1.0\"?>\n<xsl:stylesheet xmlns:xsl=\"{XSL_NS}\" version=\"1.0\">{body}</xsl:stylesheet>\n")
}

fn write(dir: &Path, name: &str, body: &str) {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, stylesheet(body)).unwrap();
}

fn quiet() -> ProcessorConfig {
    ProcessorConfig::new().with_structured_error(|_| {})
}

fn template_names(node: &Node) -> Vec<String> {
    node.first_element()
        .map(|root| {
            root.children()
                .iter()
                .filter_map(|child| child.attribute("name"))
                .map(|name| name.to_owned())
                .collect()
        })
        .unwrap_or_default()
}

#[test]
fn relative_includes_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "main.xsl",
        "<xsl:include href=\"lib/common.xsl\"/><xsl:template name=\"main\"/>",
    );
    write(
        dir.path(),
        "lib/common.xsl",
        "<xsl:import href=\"../shared/base.xsl\"/><xsl:template name=\"common\"/>",
    );
    write(
        dir.path(),
        "shared/base.xsl",
        "<xsl:template name=\"base\"/>",
    );

    let main = path_to_uri(dir.path().join("main.xsl")).unwrap();
    let mut handler = StylesheetHandler::new(quiet());
    let sheet = handler.parse_file(&main).unwrap();
    assert!(handler.errors().is_empty(), "{:?}", handler.errors());

    let docs = sheet.documents();
    assert_eq!(docs.len(), 3);
    assert!(docs[1].system_id().unwrap().ends_with("/lib/common.xsl"));
    assert_eq!(docs[1].kind(), StylesheetType::Include);
    assert!(docs[2].system_id().unwrap().ends_with("/shared/base.xsl"));
    assert_eq!(docs[2].kind(), StylesheetType::Import);

    assert_eq!(template_names(sheet.tree()), ["main"]);
    assert_eq!(template_names(docs[1].tree()), ["common"]);
    assert_eq!(template_names(docs[2].tree()), ["base"]);
}

#[test]
fn missing_include_is_reported_and_skipped() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "main.xsl",
        "<xsl:include href=\"missing.xsl\"/><xsl:template name=\"main\"/>",
    );

    let main = path_to_uri(dir.path().join("main.xsl")).unwrap();
    let mut handler = StylesheetHandler::new(quiet());
    let sheet = handler.parse_file(&main).unwrap();
    assert!(sheet.children().is_empty());
    assert_eq!(template_names(sheet.tree()), ["main"]);

    let errors = handler.errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].kind(), ErrorKind::Io);
    assert_eq!(errors[0].href(), "missing.xsl");
}

#[test]
fn abort_stops_at_the_first_failure() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "main.xsl",
        "<xsl:include href=\"inc.xsl\"/><xsl:template name=\"main\"/>",
    );
    write(dir.path(), "inc.xsl", "<xsl:include href=\"broken.xsl\"/>");
    fs::write(dir.path().join("broken.xsl"), "<xsl:stylesheet>").unwrap();

    let main = path_to_uri(dir.path().join("main.xsl")).unwrap();
    let mut handler = StylesheetHandler::new(quiet().with_option(ProcessorOption::Abort));
    match handler.parse_file(&main) {
        Err(StylesheetError::Include(err)) => {
            // reported once, by the innermost inclusion
            assert_eq!(err.kind(), ErrorKind::Parse);
            assert_eq!(err.href(), "broken.xsl");
        }
        other => panic!("unexpected result {other:?}"),
    }
}

#[test]
fn self_inclusion_hits_the_depth_limit() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "loop.xsl", "<xsl:include href=\"loop.xsl\"/>");

    let main = path_to_uri(dir.path().join("loop.xsl")).unwrap();
    let mut handler = StylesheetHandler::new(quiet().with_max_depth(5));
    let sheet = handler.parse_file(&main).unwrap();
    assert_eq!(sheet.documents().len(), 6);
    assert_eq!(handler.errors().len(), 1);
    assert_eq!(handler.errors()[0].kind(), ErrorKind::Resolution);
}

struct TestScheme;

impl XmlInputCallback for TestScheme {
    fn is_match(&self, filename: &str) -> bool {
        filename.starts_with("include-test:")
    }

    fn open(&mut self, filename: &str) -> io::Result<Box<dyn Read>> {
        let body = match &filename["include-test:".len()..] {
            "/main.xsl" => stylesheet("<xsl:include href=\"part.xsl\"/><xsl:template name=\"main\"/>"),
            "/part.xsl" => stylesheet("<xsl:template name=\"part\"/>"),
            _ => return Err(io::Error::new(io::ErrorKind::NotFound, filename.to_owned())),
        };
        Ok(Box::new(Cursor::new(body.into_bytes())))
    }
}

#[test]
fn documents_are_opened_through_input_callbacks() {
    register_input_callbacks(TestScheme).unwrap();
    let mut handler = StylesheetHandler::new(quiet());
    let sheet = handler.parse_file("include-test:/main.xsl").unwrap();
    assert!(handler.errors().is_empty(), "{:?}", handler.errors());
    assert_eq!(sheet.children()[0].system_id(), Some("include-test:/part.xsl"));
    assert_eq!(template_names(sheet.children()[0].tree()), ["part"]);
}

#[test]
fn network_includes_are_refused_with_nonet() {
    let mut handler = StylesheetHandler::new(quiet().with_option(ProcessorOption::NoNet));
    let main = stylesheet("<xsl:include href=\"http://example.invalid/remote.xsl\"/>");
    handler
        .parse_stylesheet(InputSource::from_memory(main).with_system_id("file:///virtual/main.xsl"))
        .unwrap();
    assert_eq!(handler.errors().len(), 1);
    assert_eq!(handler.errors()[0].kind(), ErrorKind::Io);
}

#[test]
fn uri_resolver_trees_are_spliced() {
    struct Trees;
    impl UriResolver for Trees {
        fn get_tree_node(&self, source: &InputSource) -> Option<Node> {
            let name = source.system_id()?.rsplit('/').next()?.to_owned();
            Some(Node::document(vec![Node::element(
                "xsl:stylesheet",
                vec![Attribute::new("xmlns:xsl", XSL_NS)],
                vec![Node::element(
                    "xsl:template",
                    vec![Attribute::new("name", name)],
                    vec![],
                )],
            )]))
        }
    }

    let mut handler = StylesheetHandler::new(quiet().with_uri_resolver(Trees));
    let main = stylesheet("<xsl:import href=\"tree.xsl\"/>");
    let sheet = handler
        .parse_stylesheet(InputSource::from_memory(main).with_system_id("file:///virtual/main.xsl"))
        .unwrap();
    assert!(handler.errors().is_empty(), "{:?}", handler.errors());
    let imported = sheet.imports().next().unwrap();
    assert_eq!(imported.system_id(), Some("file:///virtual/tree.xsl"));
    assert_eq!(template_names(imported.tree()), ["tree.xsl"]);
}

#[test]
fn default_factory_builds_one_reader_per_inclusion() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "main.xsl",
        "<xsl:include href=\"a.xsl\"/><xsl:include href=\"b.xsl\"/>",
    );
    write(dir.path(), "a.xsl", "");
    write(dir.path(), "b.xsl", "");

    let calls = Rc::new(Cell::new(0));
    let counter = calls.clone();
    let factory = move || -> Result<Box<dyn XmlReader>, Box<dyn Error>> {
        counter.set(counter.get() + 1);
        Ok(Box::new(XmlStreamReader::new(0)))
    };
    let mut handler = StylesheetHandler::new(quiet().with_reader_factory(factory));
    let main = path_to_uri(dir.path().join("main.xsl")).unwrap();
    let sheet = handler.parse_file(&main).unwrap();
    assert_eq!(sheet.children().len(), 2);
    // the top-level stylesheet and each inclusion
    assert_eq!(calls.get(), 3);
}

#[test]
fn included_events_are_spliced_between_the_directive_tags() {
    struct Splicer {
        config: ProcessorConfig,
        base: String,
        ty: StylesheetType,
        frames: Vec<Option<String>>,
        log: Vec<String>,
    }

    impl ContentHandler for Splicer {
        fn start_element(&mut self, name: &str, attrs: &[Attribute]) -> Result<(), HandlerError> {
            self.log.push(format!("<{name}>"));
            if name == "include" {
                let directive = InclusionDirective::from_attributes(DirectiveKind::Include, attrs);
                process_include(self, &directive)?;
            }
            Ok(())
        }

        fn end_element(&mut self, name: &str) -> Result<(), HandlerError> {
            self.log.push(format!("</{name}>"));
            Ok(())
        }

        fn characters(&mut self, text: &str) -> Result<(), HandlerError> {
            self.log.push(format!("{text} ({:?})", self.ty));
            Ok(())
        }
    }

    impl IncludeContext for Splicer {
        fn config(&self) -> &ProcessorConfig {
            &self.config
        }
        fn base_identifier(&self) -> Option<&str> {
            match self.frames.last() {
                Some(frame) => frame.as_deref(),
                None => Some(self.base.as_str()),
            }
        }
        fn stylesheet_type(&self) -> StylesheetType {
            self.ty
        }
        fn set_stylesheet_type(&mut self, ty: StylesheetType) {
            self.ty = ty;
        }
        fn push_frame(&mut self, system_id: Option<&str>) {
            self.frames.push(system_id.map(|s| s.to_owned()));
        }
        fn pop_frame(&mut self, _completed: bool) {
            self.frames.pop();
        }
        fn depth(&self) -> usize {
            self.frames.len()
        }
        fn report_error(&mut self, err: IncludeError) -> Result<(), IncludeError> {
            Err(err)
        }
    }

    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("inc.xml"), "<inc>x</inc>").unwrap();
    let base = path_to_uri(dir.path().join("main.xml")).unwrap();

    let mut splicer = Splicer {
        config: ProcessorConfig::new(),
        base: base.clone(),
        ty: StylesheetType::TopLevel,
        frames: vec![],
        log: vec![],
    };
    XmlStreamReader::new(0)
        .parse(
            InputSource::from_memory("<root>a<include href='inc.xml'/>b</root>").with_system_id(base),
            &mut splicer,
        )
        .unwrap();
    assert_eq!(
        splicer.log,
        [
            "<root>",
            "a (TopLevel)",
            "<include>",
            "<inc>",
            "x (Include)",
            "</inc>",
            "</include>",
            "b (TopLevel)",
            "</root>",
        ]
    );
    assert!(splicer.frames.is_empty());
}
