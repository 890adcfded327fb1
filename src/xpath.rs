use anyhow::{format_err, Result};
use libxml::parser::Parser;
use libxml::tree::{Document, NodeType};
use libxml::xpath::Context;

/// 解析后的 HTML 文档，只用于 xpath 查询
pub struct Html {
    // context 内部引用了 document，需要保证 document 活得更久
    context: Context,
    _document: Document,
}

impl Html {
    /// 对整个文档执行 xpath，返回所有属性/文本节点的内容
    ///
    /// 匹配到元素节点时返回其文本内容；没有匹配时返回空列表
    pub fn texts(&self, xpath: &str) -> Result<Vec<String>> {
        let nodes = self
            .context
            .evaluate(xpath)
            .map_err(|_| format_err!("failed to evaluate xpath: {}", xpath))?
            .get_nodes_as_vec();
        Ok(nodes
            .into_iter()
            .filter(|node| {
                matches!(
                    node.get_type(),
                    Some(NodeType::AttributeNode)
                        | Some(NodeType::TextNode)
                        | Some(NodeType::ElementNode)
                )
            })
            .map(|node| node.get_content())
            .collect())
    }
}

pub fn parse_html<S: AsRef<str>>(html: S) -> Result<Html> {
    let parser = Parser::default_html();
    let document = parser
        .parse_string(html.as_ref())
        .map_err(|_| format_err!("failed to parse html"))?;
    if document.get_root_element().is_none() {
        return Err(format_err!("no root element"));
    }
    let context = Context::new(&document).map_err(|_| format_err!("failed to new context"))?;
    Ok(Html {
        context,
        _document: document,
    })
}

#[cfg(test)]
mod tests {
    use super::parse_html;

    #[test]
    fn find_attributes() {
        let html = r#"
        <!doctype html>
        <html>
          <head><title>results</title></head>
          <body>
            <div id="islrg">
              <img class="rg_i" src="https://example.com/a.jpg">
              <img class="rg_i" data-src="https://example.com/b.png">
              <a href="/imgres?imgurl=https://example.com/c.jpeg&amp;imgrefurl=x">c</a>
            </div>
          </body>
        </html>
        "#;
        let html = parse_html(html).unwrap();
        assert_eq!(
            html.texts("//img/@src").unwrap(),
            vec!["https://example.com/a.jpg"]
        );
        assert_eq!(
            html.texts("//img/@data-src").unwrap(),
            vec!["https://example.com/b.png"]
        );
        assert_eq!(html.texts("//a/text()").unwrap(), vec!["c"]);
        assert!(html.texts("//video/@src").unwrap().is_empty());
    }
}
