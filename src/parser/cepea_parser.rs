// CEPEA indicator-page HTML parsing
use crate::model::{ParserError, RawPriceRecord, ScrapeRequest};
use chrono::{Local, NaiveDate, NaiveDateTime};
use scraper::{ElementRef, Html, Selector};

pub const SOURCE_NAME: &str = "CEPEA/ESALQ";

pub trait Parser {
    fn parse(&self, html: &str, req: &ScrapeRequest) -> Result<Vec<RawPriceRecord>, ParserError>;
}

pub struct CepeaParser {
    collected_at: NaiveDateTime,
}

impl CepeaParser {
    pub fn new() -> Self {
        Self::with_timestamp(Local::now().naive_local())
    }

    pub fn with_timestamp(collected_at: NaiveDateTime) -> Self {
        Self { collected_at }
    }
}

impl Default for CepeaParser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser for CepeaParser {
    fn parse(&self, html: &str, req: &ScrapeRequest) -> Result<Vec<RawPriceRecord>, ParserError> {
        let document = Html::parse_document(html);

        let table_selector = selector("table.imagenet-table")?;
        let row_selector = selector("tr")?;
        let cell_selector = selector("td")?;

        let collected_at = self.collected_at.format("%Y-%m-%d %H:%M:%S").to_string();
        let mut records = Vec::new();

        for (index, table) in document.select(&table_selector).enumerate() {
            let region = table_region(&table, index);
            let table_id = table
                .value()
                .attr("id")
                .map(str::to_string)
                .unwrap_or_else(|| format!("imagenet-indicador{}", index + 1));

            // first row is the header
            for row in table.select(&row_selector).skip(1) {
                let cells: Vec<String> = row
                    .select(&cell_selector)
                    .map(|c| c.text().collect::<String>().trim().to_string())
                    .collect();
                if cells.len() < 2 {
                    continue;
                }

                let Ok(date) = NaiveDate::parse_from_str(&cells[0], "%d/%m/%Y") else {
                    continue;
                };
                let Some(price) = clean_price(&cells[1]).filter(|p| *p != 0.0) else {
                    continue;
                };

                records.push(RawPriceRecord {
                    commodity: req.commodity.clone(),
                    date: date.format("%Y-%m-%d").to_string(),
                    price: price.to_string(),
                    region: region.to_string(),
                    quantity: String::new(),
                    source: SOURCE_NAME.to_string(),
                    collected_at: collected_at.clone(),
                    table_id: table_id.clone(),
                });
            }
        }

        Ok(records)
    }
}

fn selector(css: &str) -> Result<Selector, ParserError> {
    Selector::parse(css).map_err(|e| ParserError::HtmlParseError(e.to_string()))
}

/// Keeps digits and the decimal comma: `"R$ 1.234,56"` -> 1234.56.
pub fn clean_price(text: &str) -> Option<f64> {
    let digits: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == ',')
        .collect();
    if digits.is_empty() {
        return None;
    }
    digits.replace(',', ".").parse().ok()
}

/// Region label from the nearest preceding title block, else by table position.
fn table_region(table: &ElementRef, index: usize) -> &'static str {
    let title = table
        .prev_siblings()
        .filter_map(ElementRef::wrap)
        .find(|el| {
            el.value().name() == "div"
                && el
                    .value()
                    .attr("class")
                    .is_some_and(|class| class.contains("table-titulo"))
        })
        .map(|el| el.text().collect::<String>().trim().to_uppercase());

    if let Some(title) = title {
        if title.contains("PARANAGUÁ") {
            return "Paranaguá/PR";
        }
        if title.contains("PARANÁ") {
            return "Paraná";
        }
        if title.contains("SÃO PAULO") || title.contains("SP") {
            return "São Paulo";
        }
    }

    match index {
        0 => "Paranaguá/PR",
        1 => "Paraná",
        2 => "São Paulo/SP",
        _ => "Brasil",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><body>
          <div class="imagenet-table-titulo">Indicador da Soja CEPEA/ESALQ - Paranaguá</div>
          <table class="imagenet-table" id="imagenet-indicador1">
            <tr><th>Data</th><th>Valor R$</th></tr>
            <tr><td>05/01/2024</td><td>150,25</td></tr>
            <tr><td>08/01/2024</td><td>1.151,30</td></tr>
            <tr><td>Média</td><td>150,00</td></tr>
            <tr><td>09/01/2024</td><td>-</td></tr>
            <tr><td>10/01/2024</td></tr>
          </table>
          <table class="imagenet-table">
            <tr><th>Data</th><th>Valor R$</th></tr>
            <tr><td>05/01/2024</td><td>140,10</td></tr>
          </table>
          <table class="other-table">
            <tr><th>Data</th><th>Valor</th></tr>
            <tr><td>05/01/2024</td><td>1,00</td></tr>
          </table>
        </body></html>
    "#;

    fn request() -> ScrapeRequest {
        ScrapeRequest {
            commodity: "SOJA".into(),
            url: "https://example.invalid/soja.aspx".into(),
        }
    }

    fn parser() -> CepeaParser {
        let at = NaiveDate::from_ymd_opt(2024, 1, 10)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap();
        CepeaParser::with_timestamp(at)
    }

    #[test]
    fn extracts_valid_rows_only() {
        let rows = parser().parse(PAGE, &request()).unwrap();
        assert_eq!(rows.len(), 3);

        assert_eq!(rows[0].commodity, "SOJA");
        assert_eq!(rows[0].date, "2024-01-05");
        assert_eq!(rows[0].price, "150.25");
        assert_eq!(rows[0].quantity, "");
        assert_eq!(rows[0].source, SOURCE_NAME);
        assert_eq!(rows[0].collected_at, "2024-01-10 09:30:00");
        assert_eq!(rows[0].table_id, "imagenet-indicador1");
        assert_eq!(rows[1].price, "1151.3");
    }

    #[test]
    fn region_comes_from_title_then_position() {
        let rows = parser().parse(PAGE, &request()).unwrap();
        assert_eq!(rows[0].region, "Paranaguá/PR");
        // second table has the same preceding title block
        assert_eq!(rows[2].region, "Paranaguá/PR");
        assert_eq!(rows[2].table_id, "imagenet-indicador2");
    }

    #[test]
    fn untitled_tables_fall_back_to_index() {
        let html = r#"
            <table class="imagenet-table"><tr><th>x</th></tr><tr><td>01/02/2024</td><td>10,0</td></tr></table>
            <table class="imagenet-table"><tr><th>x</th></tr><tr><td>01/02/2024</td><td>11,0</td></tr></table>
            <table class="imagenet-table"><tr><th>x</th></tr><tr><td>01/02/2024</td><td>12,0</td></tr></table>
            <table class="imagenet-table"><tr><th>x</th></tr><tr><td>01/02/2024</td><td>13,0</td></tr></table>
        "#;
        let rows = parser().parse(html, &request()).unwrap();
        let regions: Vec<_> = rows.iter().map(|r| r.region.as_str()).collect();
        assert_eq!(regions, vec!["Paranaguá/PR", "Paraná", "São Paulo/SP", "Brasil"]);
    }

    #[test]
    fn page_without_tables_yields_nothing() {
        let rows = parser().parse("<html><body><p>manutenção</p></body></html>", &request()).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn price_cleaning() {
        assert_eq!(clean_price("R$ 150,25"), Some(150.25));
        assert_eq!(clean_price("1.151,30"), Some(1151.3));
        assert_eq!(clean_price("-"), None);
    }
}
