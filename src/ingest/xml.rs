//! XML configuration documents

use super::{ConfigElement, ConfigParser, ConfigSource};
use crate::error::IngestError;
use indexmap::IndexMap;
use roxmltree::{Document, Node, ParsingOptions};

/// Parses Spring-style XML bean files
#[derive(Debug, Clone, Copy, Default)]
pub struct XmlConfigParser;

impl ConfigParser for XmlConfigParser {
    fn parse(&self, source: &ConfigSource) -> Result<Vec<ConfigElement>, IngestError> {
        let malformed = |message: String| IngestError::Malformed {
            source_name: source.name.clone(),
            message,
        };
        let text = std::str::from_utf8(&source.bytes).map_err(|e| malformed(e.to_string()))?;
        let options = ParsingOptions {
            allow_dtd: true,
            ..ParsingOptions::default()
        };
        let doc = Document::parse_with_options(text, options).map_err(|e| malformed(e.to_string()))?;
        Ok(doc
            .root_element()
            .children()
            .filter(Node::is_element)
            .map(|node| convert(&doc, node, &source.name))
            .collect())
    }
}

fn convert(doc: &Document<'_>, node: Node<'_, '_>, source_name: &str) -> ConfigElement {
    let mut attributes = IndexMap::new();
    for attr in node.attributes() {
        let key = match attr.namespace() {
            Some(uri) => match node.lookup_prefix(uri) {
                Some(prefix) => format!("{}:{}", prefix, attr.name()),
                None => format!("{{{}}}{}", uri, attr.name()),
            },
            None => attr.name().to_string(),
        };
        attributes.insert(key, attr.value().to_string());
    }

    let text: String = node
        .children()
        .filter(Node::is_text)
        .filter_map(|n| n.text())
        .collect();
    let text = text.trim();

    let pos = doc.text_pos_at(node.range().start);
    ConfigElement {
        namespace: node.tag_name().namespace().unwrap_or_default().to_string(),
        tag: node.tag_name().name().to_string(),
        attributes,
        text: (!text.is_empty()).then(|| text.to_string()),
        children: node
            .children()
            .filter(Node::is_element)
            .map(|child| convert(doc, child, source_name))
            .collect(),
        location: format!("{}:{}", source_name, pos.row),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespaced_attributes_keep_prefix() {
        let xml = r#"<beans xmlns="http://www.springframework.org/schema/beans"
       xmlns:p="http://www.springframework.org/schema/p">
  <bean id="a" class="com.acme.A" p:limit="3"/>
</beans>"#;
        let elements = XmlConfigParser
            .parse(&ConfigSource::new("a.xml", xml))
            .unwrap();
        assert_eq!(elements.len(), 1);
        assert_eq!(elements[0].attribute("p:limit"), Some("3"));
        assert_eq!(elements[0].location, "a.xml:3");
    }

    #[test]
    fn test_dtd_style_document_has_empty_namespace() {
        let xml = r#"<?xml version="1.0"?>
<!DOCTYPE beans PUBLIC "-//SPRING//DTD BEAN//EN" "http://www.springframework.org/dtd/spring-beans.dtd">
<beans><bean id="a" class="com.acme.A"/></beans>"#;
        let elements = XmlConfigParser
            .parse(&ConfigSource::new("legacy.xml", xml))
            .unwrap();
        assert_eq!(elements[0].namespace, "");
        assert_eq!(elements[0].tag, "bean");
    }

    #[test]
    fn test_invalid_utf8_is_malformed() {
        let err = XmlConfigParser
            .parse(&ConfigSource::new("bin.xml", vec![0xff, 0xfe, 0x00]))
            .unwrap_err();
        assert!(matches!(err, IngestError::Malformed { source_name, .. } if source_name == "bin.xml"));
    }
}
