use anyhow::Result;
use lectern_session::Catalog;
use std::fmt::Write;

pub fn run(catalog: &Catalog, json: bool, pretty: bool) -> Result<()> {
    if json {
        let out = if pretty {
            serde_json::to_string_pretty(catalog)?
        } else {
            serde_json::to_string(catalog)?
        };
        println!("{}", out);
    } else {
        print!("{}", render(catalog));
    }
    Ok(())
}

fn render(catalog: &Catalog) -> String {
    let width = catalog.iter().map(|e| e.id.len()).max().unwrap_or(0);
    let mut out = String::new();
    for (i, (category, entries)) in catalog.by_category().into_iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let _ = writeln!(out, "{}", category);
        for entry in entries {
            let _ = writeln!(out, "  {:<width$}  {}", entry.id, entry.name, width = width);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_groups() {
        let catalog = Catalog::new()
            .with_entry("kjv", "kjv.json", "King James Version", "Christian Canon")
            .with_entry("bom", "bom.json", "Book of Mormon", "Latter-day Saints Canon")
            .with_entry("nasb", "nasb.json", "New American Standard Bible", "Christian Canon");
        assert_eq!(
            render(&catalog),
            "Christian Canon\n  kjv   King James Version\n  nasb  New American Standard Bible\n\n\
             Latter-day Saints Canon\n  bom   Book of Mormon\n"
        );
    }

    #[test]
    fn test_render_empty() {
        assert_eq!(render(&Catalog::new()), "");
    }
}
