//! HTML pages

use ota_types::Artifact;

pub fn index_page(artifacts: &[Artifact]) -> String {
    let links: Vec<String> = artifacts
        .iter()
        .map(|a| {
            // one path segment: `#`, `?` and `%` must not reach the URL raw
            let href = urlencoding::encode(&a.filename);
            format!(r#"<a href="/{href}">{}</a>"#, escape(&a.filename))
        })
        .collect();

    format!(
        r#"<h2>Available FPV Firmware Files</h2>
{}

<hr>
<h3>Fetch New Firmware</h3>
<form method="post" action="/fetch">
    Board keyword (optional): <input type="text" name="keyword">
    <input type="submit" value="Fetch latest">
</form>
<br>
<a href="/fetch-status">View last fetch log</a>
"#,
        links.join("<br>")
    )
}

pub fn status_page(lines: &[String]) -> String {
    let body: Vec<String> = lines.iter().map(|l| escape(l)).collect();
    format!("<pre>{}</pre>", body.join("\n"))
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn artifact(filename: &str) -> Artifact {
        Artifact {
            filename: filename.to_string(),
            size: 1,
            path: PathBuf::from("/srv").join(filename),
        }
    }

    #[test]
    fn test_index_page_links() {
        let html = index_page(&[artifact("a&b_fpv.tgz"), artifact("openipc.ssc338q-nor-fpv.tgz")]);
        assert!(html.contains(r#"<a href="/a%26b_fpv.tgz">a&amp;b_fpv.tgz</a>"#));
        assert!(html.contains(
            r#"<a href="/openipc.ssc338q-nor-fpv.tgz">openipc.ssc338q-nor-fpv.tgz</a>"#
        ));
    }

    #[test]
    fn test_index_page_encodes_reserved_characters() {
        let html = index_page(&[artifact("fw#2?v=1%_fpv.tgz")]);
        assert!(html.contains(r#"<a href="/fw%232%3Fv%3D1%25_fpv.tgz">fw#2?v=1%_fpv.tgz</a>"#));
    }

    #[test]
    fn test_empty_status_page() {
        assert_eq!(status_page(&[]), "<pre></pre>");
    }
}
