// MOLIT (data.go.kr) response parsing
use crate::model::{LookupError, RawTransaction};
use scraper::{ElementRef, Html, Selector};

/// Field names of the apartment trade item, in the casing the API uses.
/// The markup parser lowercases tag names, so they are restored from here.
const KNOWN_FIELDS: &[&str] = &[
    "sggCd",
    "umdCd",
    "landCd",
    "bonbun",
    "bubun",
    "roadNm",
    "roadNmSggCd",
    "roadNmCd",
    "roadNmSeq",
    "roadNmbCd",
    "roadNmBonbun",
    "roadNmBubun",
    "umdNm",
    "aptNm",
    "jibun",
    "excluUseAr",
    "dealYear",
    "dealMonth",
    "dealDay",
    "dealAmount",
    "floor",
    "buildYear",
    "aptSeq",
    "cdealType",
    "cdealDay",
    "dealingGbn",
    "estateAgentSggNm",
    "rgstDate",
    "aptDong",
    "slerGbn",
    "buyerGbn",
    "landLeaseholdGbn",
];

const SUCCESS_CODES: &[&str] = &["00", "000"];
/// Older gateways answer an empty month with `03 NO_DATA`.
const NO_DATA_CODE: &str = "03";

/// One page of a lookup response.
#[derive(Debug, Clone, Default)]
pub struct ResponsePage {
    pub items: Vec<RawTransaction>,
    pub total_count: usize,
}

pub trait Parser {
    fn parse(&self, body: &str) -> Result<ResponsePage, LookupError>;
}

pub struct MolitParser;

impl MolitParser {
    pub fn new() -> Self {
        Self
    }
}

impl Default for MolitParser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser for MolitParser {
    fn parse(&self, body: &str) -> Result<ResponsePage, LookupError> {
        let document = Html::parse_document(body);

        // Gateway-level failures (bad key, quota) use a different envelope.
        if let Some(reason) = first_text(&document, "returnreasoncode")? {
            let message = first_text(&document, "returnauthmsg")?
                .or(first_text(&document, "errmsg")?)
                .unwrap_or_default();
            return Err(LookupError::Api { code: reason, message });
        }

        let code = first_text(&document, "resultcode")?
            .ok_or_else(|| LookupError::Parse("missing resultCode".into()))?;
        if code == NO_DATA_CODE {
            return Ok(ResponsePage::default());
        }
        if !SUCCESS_CODES.contains(&code.as_str()) {
            let message = first_text(&document, "resultmsg")?.unwrap_or_default();
            return Err(LookupError::Api { code, message });
        }

        let item_selector = selector("item")?;
        let mut items = Vec::new();
        for item in document.select(&item_selector) {
            let mut raw = RawTransaction::default();
            for field in item.descendants().skip(1).filter_map(ElementRef::wrap) {
                raw.push(&canonical_name(field.value().name()), &own_text(field));
            }
            items.push(raw);
        }

        let total_count = match first_text(&document, "totalcount")? {
            Some(text) => text
                .parse()
                .map_err(|_| LookupError::Parse(format!("bad totalCount '{}'", text)))?,
            None => items.len(),
        };

        Ok(ResponsePage { items, total_count })
    }
}

fn selector(css: &'static str) -> Result<Selector, LookupError> {
    Selector::parse(css).map_err(|e| LookupError::Parse(format!("selector {}: {:?}", css, e)))
}

fn first_text(document: &Html, tag: &'static str) -> Result<Option<String>, LookupError> {
    let sel = selector(tag)?;
    Ok(document.select(&sel).next().map(own_text))
}

/// Text directly inside the element. Empty tags written as `<x/>` may end
/// up wrapping their siblings, so descendant text is never included.
fn own_text(element: ElementRef) -> String {
    let text: String = element
        .children()
        .filter_map(|child| child.value().as_text().map(|t| &**t))
        .collect();
    text.trim().to_string()
}

fn canonical_name(lowercase: &str) -> String {
    KNOWN_FIELDS
        .iter()
        .find(|f| f.eq_ignore_ascii_case(lowercase))
        .map(|f| f.to_string())
        .unwrap_or_else(|| lowercase.to_string())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample_item(sgg: &str, apt: &str, amount: &str, day: u32) -> String {
        format!(
            "<item><aptDong> </aptDong><aptNm>{apt}</aptNm><buildYear>2008</buildYear>\
             <cdealDay> </cdealDay><cdealType> </cdealType><dealAmount>{amount}</dealAmount>\
             <dealDay>{day}</dealDay><dealMonth>7</dealMonth><dealYear>2024</dealYear>\
             <dealingGbn>중개거래</dealingGbn><excluUseAr>84.97</excluUseAr><floor>12</floor>\
             <jibun>1-2</jibun><sggCd>{sgg}</sggCd><umdNm>사직동</umdNm></item>"
        )
    }

    pub(crate) fn sample_response(items: &[String], total: usize) -> String {
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
             <response><header><resultCode>000</resultCode><resultMsg>OK</resultMsg></header>\
             <body><items>{}</items><numOfRows>1000</numOfRows><pageNo>1</pageNo>\
             <totalCount>{}</totalCount></body></response>",
            items.concat(),
            total
        )
    }

    #[test]
    fn parses_items_and_total() {
        let body = sample_response(
            &[
                sample_item("11110", "광화문풍림스페이스본", "    82,500", 3),
                sample_item("11110", "경희궁의아침", "120,000", 21),
            ],
            2,
        );
        let page = MolitParser::new().parse(&body).unwrap();
        assert_eq!(page.total_count, 2);
        assert_eq!(page.items.len(), 2);

        let first = &page.items[0];
        assert_eq!(first.get("aptNm"), Some("광화문풍림스페이스본"));
        assert_eq!(first.get("dealAmount"), Some("82,500"));
        assert_eq!(first.get("excluUseAr"), Some("84.97"));
        assert_eq!(first.get("sggCd"), Some("11110"));
        assert_eq!(first.get("aptDong"), Some(""));
        assert_eq!(first.fields[0].0, "aptDong");
        assert_eq!(page.items[1].get("dealDay"), Some("21"));
    }

    #[test]
    fn self_closing_fields_do_not_swallow_siblings() {
        let body = sample_response(
            &["<item><cdealDay/><aptNm>래미안</aptNm><dealAmount>50,000</dealAmount></item>"
                .to_string()],
            1,
        );
        let page = MolitParser::new().parse(&body).unwrap();
        assert_eq!(page.items.len(), 1);
        let item = &page.items[0];
        assert_eq!(item.get("cdealDay"), Some(""));
        assert_eq!(item.get("aptNm"), Some("래미안"));
        assert_eq!(item.get("dealAmount"), Some("50,000"));
    }

    #[test]
    fn empty_result() {
        let page = MolitParser::new().parse(&sample_response(&[], 0)).unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.total_count, 0);
    }

    #[test]
    fn no_data_code_is_an_empty_page() {
        let body = "<response><header><resultCode>03</resultCode>\
                    <resultMsg>NO_DATA</resultMsg></header></response>";
        let page = MolitParser::new().parse(body).unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.total_count, 0);
    }

    #[test]
    fn api_error_code() {
        let body = "<response><header><resultCode>10</resultCode>\
                    <resultMsg>INVALID_REQUEST_PARAMETER_ERROR</resultMsg></header></response>";
        match MolitParser::new().parse(body) {
            Err(LookupError::Api { code, message }) => {
                assert_eq!(code, "10");
                assert_eq!(message, "INVALID_REQUEST_PARAMETER_ERROR");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn gateway_error_envelope() {
        let body = "<OpenAPI_ServiceResponse><cmmMsgHeader><errMsg>SERVICE ERROR</errMsg>\
                    <returnAuthMsg>SERVICE_KEY_IS_NOT_REGISTERED_ERROR</returnAuthMsg>\
                    <returnReasonCode>30</returnReasonCode></cmmMsgHeader>\
                    </OpenAPI_ServiceResponse>";
        match MolitParser::new().parse(body) {
            Err(err @ LookupError::Api { .. }) => {
                assert!(!err.is_retryable());
                assert!(err.to_string().contains("SERVICE_KEY_IS_NOT_REGISTERED_ERROR"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn garbage_is_a_parse_error() {
        let result = MolitParser::new().parse("Unexpected errors");
        assert!(matches!(result, Err(LookupError::Parse(_))));
    }
}
