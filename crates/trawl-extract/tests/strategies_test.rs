use trawl_browser::StaticPage;
use trawl_core::{Category, Record};
use trawl_extract::StrategyRegistry;

const BASE: &str = "https://northwind.example/tents";

fn storefront() -> StaticPage {
    StaticPage::new(include_str!("fixtures/storefront.html"), BASE)
        .expect("fixture page")
        .with_metrics(2400, 800)
}

async fn run(page: &StaticPage, category: Category) -> Vec<Record> {
    let registry = StrategyRegistry::default();
    let strategy = registry.require(category).unwrap();
    strategy.extract(page, BASE).await.unwrap()
}

#[tokio::test]
async fn test_products_from_cards() {
    let page = storefront();
    let records = run(&page, Category::Products).await;

    let products: Vec<_> = records
        .iter()
        .map(|r| match r {
            Record::Product(p) => p,
            other => panic!("unexpected record {other:?}"),
        })
        .collect();

    assert_eq!(products.len(), 2);
    assert_eq!(products[0].title, "Ridge 2P Tent");
    assert_eq!(products[0].price.as_deref(), Some("$249.00"));
    assert_eq!(
        products[0].link.as_deref(),
        Some("https://northwind.example/tents/ridge-2p")
    );
    assert_eq!(
        products[0].image.as_deref(),
        Some("https://northwind.example/img/ridge-2p.jpg")
    );
    assert_eq!(products[1].title, "Summit 4P Tent");
    assert!(products[1].image.is_none());
}

#[tokio::test]
async fn test_images_after_scroll() {
    let page = storefront();
    let records = run(&page, Category::Images).await;

    let urls: Vec<_> = records
        .iter()
        .filter_map(|r| match r {
            Record::Image(i) => Some(i.url.as_str()),
            _ => None,
        })
        .collect();

    assert!(urls.contains(&"https://northwind.example/img/ridge-2p@2x.jpg"));
    assert!(urls.contains(&"https://northwind.example/img/summit-4p.jpg"));
    assert!(urls.contains(&"https://northwind.example/static/hero.jpg"));
    assert!(!urls.iter().any(|u| u.contains("pixel")));

    // 2400px page, 400px steps, then back to the top
    assert_eq!(
        page.scroll_positions(),
        vec![0, 400, 800, 1200, 1600, 2000, 0]
    );
}

#[tokio::test]
async fn test_contacts_from_footer() {
    let page = storefront();
    let records = run(&page, Category::Contacts).await;

    let Record::Contacts(contacts) = &records[0] else {
        panic!("expected contacts");
    };
    assert_eq!(
        contacts.emails,
        vec!["orders@northwind.example", "help@northwind.example"]
    );
    assert!(contacts.phones.contains(&"+15552013300".to_string()));
    assert!(contacts.phones.contains(&"555-201-3344".to_string()));
    assert_eq!(contacts.socials.len(), 2);
}

#[tokio::test]
async fn test_text_then_assets_share_the_page() {
    let page = storefront();

    let text = run(&page, Category::Text).await;
    let Record::Text(text) = &text[0] else {
        panic!("expected text");
    };
    assert_eq!(text.title, "Northwind Outfitters | Tents");
    assert_eq!(text.meta, "Tents and shelters for every season.");
    assert!(text.headings.contains(&"Buying guide".to_string()));
    assert!(!text.paragraphs.iter().any(|p| p.contains("newsletter")));

    // The footer is gone once text extraction has run
    let assets = run(&page, Category::Assets).await;
    let files: Vec<_> = assets
        .iter()
        .filter_map(|r| match r {
            Record::Asset(a) => Some(a.filename.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(files, vec!["tent-buying-guide.pdf", "care.docx"]);
}

#[tokio::test]
async fn test_assets_on_untouched_page() {
    let page = storefront();
    let assets = run(&page, Category::Assets).await;
    assert_eq!(assets.len(), 3);
}
