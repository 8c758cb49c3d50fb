//! End-to-end batch tests against scripted portals.
//!
//! Every test drives `scrape()` through the in-memory renderer, so no
//! browser is needed.

use serde_json::{json, Value};

use supplier_scraper::renderer::fake::{fast_timeouts, FakeElement, FakeLauncher, FakePage, FakeSite};
use supplier_scraper::renderer::Locator;
use supplier_scraper::sites::{eklor, powr_connect, voltaneo};
use supplier_scraper::{
    scrape, Credentials, FieldValue, ProductRef, ScrapeError, ScrapeOutput, ScrapeRequest,
    ScraperConfig, Site,
};

// ─────────────────────── helpers ───────────────────────

const USER: &str = "achats@example.com";
const PASSWORD: &str = "s3cret";

fn config() -> ScraperConfig {
    ScraperConfig::default().with_timeouts(fast_timeouts())
}

fn request(password: &str, items: Vec<ProductRef>) -> ScrapeRequest {
    ScrapeRequest {
        credentials: Credentials {
            username: USER.into(),
            password: password.into(),
        },
        items,
    }
}

fn item(url: &str, manufacturer_id: &str) -> ProductRef {
    ProductRef::new(url)
        .with("product_category", "Câbles")
        .with("manufacturer", "Nexans")
        .with("manufacturer_id", manufacturer_id)
        .with("supplier", "Rexel")
}

fn to_json(output: &ScrapeOutput) -> Value {
    serde_json::to_value(output).unwrap()
}

fn eklor_site() -> FakeSite {
    FakeSite::new()
        .page(
            eklor::LOGIN_URL,
            FakePage::new()
                .text("input[type=\"email\"]", "")
                .text("input[type=\"password\"]", "")
                .text("button[type=\"submit\"]", "Se connecter"),
        )
        .accepts_login("button[type=\"submit\"]", USER, PASSWORD, eklor::HOME_URL)
}

fn eklor_product(price: Option<&str>) -> FakePage {
    let page = FakePage::new()
        .text("h1.mb-4.text-2xl.font-medium", "  Câble R2V 3G2,5  ")
        .text("button.Stock-label.Stock-label", "24 produits en stock")
        .text("p.mb-6.text-base.font-normal", "Câble rigide pour installation fixe.")
        .text("li.bullet-list", " Section : 2,5 mm² ")
        .text("li.bullet-list", "Longueur : 100 m");
    match price {
        Some(price) => page.text("span.text-3xl.font-semibold", price),
        None => page,
    }
}

fn powr_connect_site() -> FakeSite {
    FakeSite::new()
        .page(
            powr_connect::LOGIN_URL,
            FakePage::new()
                .text("input[name=\"username\"]", "")
                .text("input[name=\"password\"]", "")
                .text("form[action*=\"/connexion\"]", ""),
        )
        .accepts_login(
            "form[action*=\"/connexion\"]",
            USER,
            PASSWORD,
            "https://powr-connect.shop/",
        )
}

fn powr_connect_product(name: &str) -> FakePage {
    FakePage::new()
        .text("h1.text-2xl.font-semibold.tracking-tight", name)
        .text("p.mt-4", "Disjoncteur modulaire")
        .text("p.text-2xl.font-semibold.leading-none", "8,90 € HT")
        .text("button.Stock-label.Stock-label", "Rupture")
        .text("ul.bulleted-list li", "Courbe C")
}

fn voltaneo_site() -> FakeSite {
    FakeSite::new()
        .page(
            voltaneo::LOGIN_URL,
            FakePage::new()
                .text("input[name=\"username\"]", "")
                .text("input[name=\"password\"]", "")
                .text("input[name=\"rememberme\"]", "")
                .text("button:has-text(\"Se connecter\")", "Se connecter"),
        )
        .accepts_login(
            "button:has-text(\"Se connecter\")",
            USER,
            PASSWORD,
            "https://webshop.voltaneo.com/mon-compte/",
        )
}

fn tier(label: &str, price: &str) -> FakeElement {
    FakeElement::new(format!("{label} {price}"))
        .child("span.label", label)
        .child("span.number", price)
}

const TIER_ROWS: &str = "section.addToCartSection p.conditionnement";

// ─────────────────────── scenarios ───────────────────────

#[tokio::test]
async fn test_eklor_batch_preserves_order_and_passthrough() {
    let site = eklor_site()
        .page("https://eklor.shop/p/1", eklor_product(Some("12,50 €")))
        .page("https://eklor.shop/p/2", eklor_product(None))
        .broken("https://eklor.shop/p/3", "net::ERR_NAME_NOT_RESOLVED");
    let launcher = FakeLauncher::new(site);

    let items = vec![
        item("https://eklor.shop/p/1", "REF-1"),
        item("https://eklor.shop/p/2", "REF-2"),
        item("https://eklor.shop/p/3", "REF-3"),
    ];
    let output = scrape(&launcher, Site::Eklor, &request(PASSWORD, items), &config())
        .await
        .unwrap();
    let rows = to_json(&output);
    let rows = rows.as_array().unwrap();

    assert_eq!(rows.len(), 3);
    for (row, id) in rows.iter().zip(["REF-1", "REF-2", "REF-3"]) {
        assert_eq!(row["manufacturer_id"], json!(id));
        assert_eq!(row["manufacturer"], json!("Nexans"));
        assert_eq!(row["product_category"], json!("Câbles"));
        assert_eq!(row["supplier"], json!("Rexel"));
    }

    let clean = &rows[0];
    assert_eq!(clean["is_ok"], json!(1));
    assert_eq!(clean["error"], Value::Null);
    assert_eq!(clean["name"], json!("Câble R2V 3G2,5"));
    assert_eq!(clean["unit_1"], json!("À l'unité"));
    assert_eq!(clean["price_per_unit_1"], json!(12.5));
    assert_eq!(clean["unit_2"], json!("N/A"));
    assert_eq!(clean["is_available"], json!(1));
    assert_eq!(
        clean["technical_ref"],
        json!(["Section : 2,5 mm²", "Longueur : 100 m"])
    );
}

#[tokio::test]
async fn test_missing_price_is_a_field_error() {
    let site = eklor_site().page("https://eklor.shop/p/2", eklor_product(None));
    let launcher = FakeLauncher::new(site);

    let items = vec![item("https://eklor.shop/p/2", "REF-2")];
    let output = scrape(&launcher, Site::Eklor, &request(PASSWORD, items), &config())
        .await
        .unwrap();
    let record = &output.records()[0];

    assert_eq!(record.is_ok, 0);
    assert_eq!(record.error.as_deref(), Some("missing price"));
    assert!(record.price_per_unit_1.is_missing());
    assert_eq!(record.unit_1, FieldValue::text("À l'unité"));
    assert_eq!(record.name, FieldValue::text("Câble R2V 3G2,5"));
    assert_eq!(record.stock, FieldValue::text("24 produits en stock"));
}

#[tokio::test]
async fn test_navigation_failure_fills_sentinels() {
    let site = eklor_site().broken("https://eklor.shop/p/3", "net::ERR_NAME_NOT_RESOLVED");
    let launcher = FakeLauncher::new(site);

    let items = vec![item("https://eklor.shop/p/3", "REF-3")];
    let output = scrape(&launcher, Site::Eklor, &request(PASSWORD, items), &config())
        .await
        .unwrap();
    let rows = to_json(&output);
    let row = &rows[0];

    assert_eq!(row["is_ok"], json!(0));
    let error = row["error"].as_str().unwrap();
    assert!(error.starts_with("page.goto failed"), "{error}");
    assert!(error.contains("ERR_NAME_NOT_RESOLVED"));
    for column in [
        "name",
        "description",
        "technical_ref",
        "price_per_unit_1",
        "unit_2",
        "price_per_unit_2",
        "unit_3",
        "price_per_unit_3",
        "stock",
    ] {
        assert_eq!(row[column], json!("N/A"), "column {column}");
    }
    assert_eq!(row["unit_1"], json!("À l'unité"));
    assert_eq!(row["is_available"], json!(0));
    assert_eq!(row["url"], json!("https://eklor.shop/p/3"));
}

#[tokio::test]
async fn test_login_failure_returns_only_the_marker() {
    let site = eklor_site().page("https://eklor.shop/p/1", eklor_product(Some("1 €")));
    let launcher = FakeLauncher::new(site);

    let items = vec![item("https://eklor.shop/p/1", "REF-1")];
    let output = scrape(&launcher, Site::Eklor, &request("wrong", items), &config())
        .await
        .unwrap();

    assert!(output.is_login_failed());
    assert_eq!(to_json(&output), json!([{ "error": "login_failed" }]));

    let journal = launcher.journal();
    assert_eq!(journal.navigations, vec![eklor::LOGIN_URL.to_string()]);
    assert_eq!(journal.contexts_closed, 1);
    assert_eq!(journal.shutdowns, 1);
}

#[tokio::test]
async fn test_eklor_launches_with_spoofed_fingerprint() {
    let launcher = FakeLauncher::new(eklor_site());
    scrape(&launcher, Site::Eklor, &request(PASSWORD, vec![]), &config())
        .await
        .unwrap();

    let journal = launcher.journal();
    assert_eq!(journal.launches.len(), 1);
    let options = &journal.launches[0];
    assert!(options.headless);
    assert!(options.user_agent.as_deref().unwrap().contains("Chrome/120"));
    assert_eq!(options.viewport.map(|v| (v.width, v.height)), Some((1280, 800)));
}

#[tokio::test]
async fn test_eklor_dismisses_consent_banner_outside_buttons() {
    let consent = Locator::with_text(eklor::CONSENT_SCOPE, eklor::CONSENT_TEXT).to_string();
    let site = FakeSite::new()
        .page(
            eklor::LOGIN_URL,
            FakePage::new()
                .text(&consent, "OK pour moi")
                .text("input[type=\"email\"]", "")
                .text("input[type=\"password\"]", "")
                .text("button[type=\"submit\"]", "Se connecter"),
        )
        .accepts_login("button[type=\"submit\"]", USER, PASSWORD, eklor::HOME_URL);
    let launcher = FakeLauncher::new(site);

    scrape(&launcher, Site::Eklor, &request(PASSWORD, vec![]), &config())
        .await
        .unwrap();

    assert!(eklor::CONSENT_SCOPE.contains("div"));
    assert!(eklor::CONSENT_SCOPE.contains("span"));
    let journal = launcher.journal();
    assert!(journal.actions.contains(&format!("click {consent}")));
}

#[tokio::test]
async fn test_panicking_item_degrades_and_batch_continues() {
    let site = powr_connect_site()
        .page("https://powr-connect.shop/p/a", powr_connect_product("Disjoncteur 16A"))
        .panics_on("https://powr-connect.shop/p/b")
        .page("https://powr-connect.shop/p/c", powr_connect_product("Disjoncteur 20A"));
    let launcher = FakeLauncher::new(site);

    let items = vec![
        item("https://powr-connect.shop/p/a", "A"),
        item("https://powr-connect.shop/p/b", "B"),
        item("https://powr-connect.shop/p/c", "C"),
    ];
    let output = scrape(&launcher, Site::PowrConnect, &request(PASSWORD, items), &config())
        .await
        .unwrap();
    let records = output.records();

    assert_eq!(records.len(), 3);
    assert_eq!(records[0].is_ok, 1);
    assert_eq!(records[0].price_per_unit_1, FieldValue::Number(8.9));
    assert_eq!(records[0].is_available, 0);

    assert_eq!(records[1].is_ok, 0);
    assert!(records[1]
        .error
        .as_deref()
        .unwrap()
        .contains("renderer crashed"));
    assert_eq!(records[1].manufacturer_id, json!("B"));
    assert!(records[1].name.is_missing());

    assert_eq!(records[2].name, FieldValue::text("Disjoncteur 20A"));

    let journal = launcher.journal();
    assert_eq!(journal.contexts_opened, 1);
    assert_eq!(journal.contexts_closed, 1);
    assert_eq!(journal.shutdowns, 1);
}

#[tokio::test]
async fn test_powr_connect_submits_login_form() {
    let launcher = FakeLauncher::new(powr_connect_site());
    let output = scrape(&launcher, Site::PowrConnect, &request(PASSWORD, vec![]), &config())
        .await
        .unwrap();

    assert_eq!(output, ScrapeOutput::Records(vec![]));
    let journal = launcher.journal();
    assert!(journal
        .actions
        .iter()
        .any(|a| a == "submit form[action*=\"/connexion\"]"));
    assert!(journal.launches[0].user_agent.is_none());
}

#[tokio::test]
async fn test_voltaneo_reads_visible_tiers_and_stock() {
    let product = FakePage::new()
        .text("h1.product_title.entry-title", "Gaine ICTA 20")
        .text("div.product_description", "Gaine annelée")
        .element(TIER_ROWS, tier("Unité", "4,20 €"))
        .element(TIER_ROWS, tier("Couronne de 50 m", "1,00 €").hidden())
        .element(TIER_ROWS, tier("Palette", "1 150,00 €"))
        .element(TIER_ROWS, tier("Camion", "9 000,00 €"))
        .text("div.stock span.label", "En stock")
        .text("div.stock span.number", " 120 ")
        .text("div.col", "")
        .text("div.col div.fcat", "  Diamètre :\n 20 mm ")
        .text("div.col div.fcat", "Couleur\r\n gris");
    let site = voltaneo_site().page("https://webshop.voltaneo.com/p/icta", product);
    let launcher = FakeLauncher::new(site);

    let items = vec![item("https://webshop.voltaneo.com/p/icta", "ICTA")];
    let output = scrape(&launcher, Site::Voltaneo, &request(PASSWORD, items), &config())
        .await
        .unwrap();
    let record = &output.records()[0];

    assert_eq!(record.is_ok, 1, "{:?}", record.error);
    assert_eq!(record.unit_1, FieldValue::text("Unité"));
    assert_eq!(record.price_per_unit_1, FieldValue::Number(4.2));
    assert_eq!(record.unit_2, FieldValue::text("Palette"));
    assert_eq!(record.price_per_unit_2, FieldValue::Number(1150.0));
    // Only the first three rows are considered, and one of them is hidden.
    assert!(record.unit_3.is_missing());
    assert!(record.price_per_unit_3.is_missing());
    assert_eq!(record.stock, FieldValue::text("En stock 120"));
    assert_eq!(record.is_available, 1);
    assert_eq!(
        record.technical_ref,
        FieldValue::List(vec!["Diamètre : 20 mm".into(), "Couleur gris".into()])
    );
}

#[tokio::test]
async fn test_voltaneo_without_tiers_or_stock() {
    let product = FakePage::new()
        .text("h1.product_title.entry-title", "Produit sans prix")
        .text("div.product_description", "Sur devis")
        .text("div.col", "")
        .text("div.col div.fcat", "Réf");
    let site = voltaneo_site().page("https://webshop.voltaneo.com/p/x", product);
    let launcher = FakeLauncher::new(site);

    let items = vec![item("https://webshop.voltaneo.com/p/x", "X")];
    let output = scrape(&launcher, Site::Voltaneo, &request(PASSWORD, items), &config())
        .await
        .unwrap();
    let record = &output.records()[0];

    assert_eq!(record.is_ok, 0);
    let error = record.error.as_deref().unwrap();
    assert!(error.starts_with("price options error: "), "{error}");
    assert!(error.ends_with("; missing stock label"), "{error}");
    for tier in [&record.unit_1, &record.price_per_unit_1, &record.unit_3] {
        assert!(tier.is_missing());
    }
    assert_eq!(record.is_available, 0);
}

#[tokio::test]
async fn test_voltaneo_tier_row_without_price_is_an_error() {
    let product = FakePage::new()
        .text("h1.product_title.entry-title", "Gaine ICTA 25")
        .text("div.product_description", "Gaine annelée")
        .element(TIER_ROWS, FakeElement::new("Unité").child("span.label", "Unité"))
        .text("div.stock span.label", "En stock")
        .text("div.col", "")
        .text("div.col div.fcat", "Diamètre : 25 mm");
    let site = voltaneo_site().page("https://webshop.voltaneo.com/p/icta25", product);
    let launcher = FakeLauncher::new(site);

    let items = vec![item("https://webshop.voltaneo.com/p/icta25", "ICTA25")];
    let output = scrape(&launcher, Site::Voltaneo, &request(PASSWORD, items), &config())
        .await
        .unwrap();
    let record = &output.records()[0];

    assert_eq!(record.is_ok, 0);
    let error = record.error.as_deref().unwrap();
    assert!(error.starts_with("price options error: "), "{error}");
    assert!(error.contains("span.number"), "{error}");
    assert!(record.unit_1.is_missing());
    assert!(record.price_per_unit_1.is_missing());
    assert_eq!(record.name, FieldValue::text("Gaine ICTA 25"));
    assert_eq!(record.stock, FieldValue::text("En stock"));
}

#[tokio::test]
async fn test_browser_launch_failure_is_an_error() {
    let launcher = FakeLauncher::new(FakeSite::new().unlaunchable("Chromium not found"));
    let err = scrape(&launcher, Site::Voltaneo, &request(PASSWORD, vec![]), &config())
        .await
        .unwrap_err();

    assert!(matches!(err, ScrapeError::BrowserUnavailable(ref m) if m.contains("Chromium not found")));
}
