use super::*;

#[test]
fn weather_keywords_route_to_weather() {
    assert_eq!(classify("What's the weather today?"), Intent::Weather);
    assert_eq!(classify("Current TEMPERATURE outside"), Intent::Weather);
    assert_eq!(classify("forecast for the weekend"), Intent::Weather);
}

#[test]
fn weather_wins_over_document_keywords() {
    assert_eq!(classify("weather for wine country"), Intent::Weather);
    assert_eq!(
        classify("Is the Napa forecast good for a vineyard tour?"),
        Intent::Weather
    );
    for weather in WEATHER_KEYWORDS {
        for document in DOCUMENT_KEYWORDS {
            let query = format!("{document} and {weather}");
            assert_eq!(classify(&query), Intent::Weather, "query: {query}");
        }
    }
}

#[test]
fn document_keywords_route_to_rag() {
    assert_eq!(
        classify("What grape varieties does Rhythm Vineyard grow?"),
        Intent::Document
    );
    assert_eq!(classify("Tell me about Cliff Lede"), Intent::Document);
    assert_eq!(classify("Do you offer TASTING flights?"), Intent::Document);
    assert_eq!(classify("stags leap district"), Intent::Document);
}

#[test]
fn unmatched_queries_fall_back_to_search() {
    assert_eq!(classify("Who won the World Series?"), Intent::Search);
    assert_eq!(classify("latest news on tariffs"), Intent::Search);
    assert_eq!(classify(""), Intent::Search);
    assert_eq!(classify("   "), Intent::Search);
}

#[test]
fn matching_is_substring_based() {
    // "wines" contains "wine"
    assert_eq!(classify("best wines of 2020"), Intent::Document);
    // "temperatures" contains "temperature"
    assert_eq!(classify("average temperatures"), Intent::Weather);
}

#[test]
fn intent_names() {
    assert_eq!(Intent::Document.as_str(), "rag");
    assert_eq!(Intent::Weather.to_string(), "weather");
    assert_eq!(Intent::Search.to_string(), "search");
    assert_eq!(serde_json::to_string(&Intent::Document).unwrap(), "\"rag\"");
    assert_eq!(
        serde_json::from_str::<Intent>("\"weather\"").unwrap(),
        Intent::Weather
    );
}

#[test]
fn custom_router_respects_rule_order() {
    let router = Router::new(
        vec![
            (KeywordSet::new(["Harvest"]), Intent::Document),
            (KeywordSet::new(["rain", "harvest"]), Intent::Weather),
        ],
        Intent::Search,
    );

    assert_eq!(router.classify("harvest rain"), Intent::Document);
    assert_eq!(router.classify("rain tomorrow"), Intent::Weather);
    assert_eq!(router.classify("stock prices"), Intent::Search);
}

#[test]
fn empty_keywords_never_match() {
    let set = KeywordSet::new(["", "  "]);
    assert!(!set.matches("anything"));
}

#[test]
fn variety_questions_use_expansion_query() {
    let config = RetrievalConfig::default();

    let rewritten = retrieval_query("What grape varieties do you grow?", &config);
    assert!(rewritten.starts_with("Rhythm Vineyard plantings include"));
    assert!(matches!(rewritten, Cow::Owned(_)));

    let rewritten = retrieval_query("Which wines do you MAKE?", &config);
    assert_eq!(Some(rewritten.as_ref()), config.expansion_query.as_deref());
}

#[test]
fn other_questions_are_searched_verbatim() {
    let config = RetrievalConfig::default();
    let query = "When was the winery founded?";
    let rewritten = retrieval_query(query, &config);
    assert_eq!(rewritten, query);
    assert!(matches!(rewritten, Cow::Borrowed(_)));
}

#[test]
fn expansion_can_be_disabled() {
    let config = RetrievalConfig {
        expansion_query: None,
        ..RetrievalConfig::default()
    };
    assert_eq!(
        retrieval_query("What varieties do you grow?", &config),
        "What varieties do you grow?"
    );
}
