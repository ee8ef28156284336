//! End-to-end run against a mock SuccessFactors server

use serde_json::json;
use sf_odata_doc::config::Config;
use sf_odata_doc::odata::metadata::DICTIONARY_SHEET;
use sf_odata_doc::pipeline;
use sf_odata_doc::report::{Sheet, Workbook};
use std::path::Path;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const USER_METADATA: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<edmx:Edmx Version="1.0" xmlns:edmx="http://schemas.microsoft.com/ado/2007/06/edmx">
  <edmx:DataServices>
    <Schema Namespace="SFOData" xmlns="http://schemas.microsoft.com/ado/2008/09/edm" xmlns:sap="http://www.successfactors.com/edm/sap">
      <EntityType Name="User">
        <Key><PropertyRef Name="UserID"/></Key>
        <Property Name="UserID" Type="Edm.String" MaxLength="100" sap:label="User ID" sap:required="true"/>
        <Property Name="status" Type="Edm.String" sap:label="Status" sap:picklist="userStatus"/>
      </EntityType>
    </Schema>
  </edmx:DataServices>
</edmx:Edmx>"#;

fn write_template(path: &Path) {
    let mut master = Sheet::new("SF Master Table List");
    master.set(0, 1, "API Name");
    master.set(0, 2, "Entity");
    master.set(0, 5, "Endpoint");
    master.set(0, 13, "System");
    master.set(0, 14, "Category");
    let rows = [
        ("Query User", "User", "http://{Test_API-Server}/odata/v2/User?$format=json"),
        ("Query Job", "EmpJob", "http://{Test_API-Server}/odata/v2/EmpJob"),
    ];
    for (i, (api_name, entity, url)) in rows.iter().enumerate() {
        let row = i + 1;
        master.set(row, 1, *api_name);
        master.set(row, 2, *entity);
        master.set(row, 5, *url);
        master.set(row, 8, "On demand");
        master.set(row, 9, "SF -> Payroll");
        master.set(row, 13, "SuccessFactors");
        master.set(row, 14, "API Resource");
    }

    let mut api = Sheet::new("API Template");
    api.set(0, 0, "API Name");
    api.set(12, 1, "Field");

    let mut reference = Sheet::new("SF Master Data Dictionary");
    for row in [["Entity", "Field"], ["User", "UserID"], ["User", "lastName"]] {
        reference.push_row(row.iter().map(|c| (*c).into()).collect());
    }

    let mut workbook = Workbook::new();
    workbook.upsert_sheet(master);
    workbook.upsert_sheet(api);
    workbook.upsert_sheet(reference);
    workbook.save(path).unwrap();
}

#[tokio::test]
async fn test_pipeline_end_to_end() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/idp"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/odata/v2/User/$metadata"))
        .and(header("Authorization", "Bearer static-token"))
        .respond_with(ResponseTemplate::new(200).set_body_string(USER_METADATA))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/odata/v2/EmpJob/$metadata"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/odata/v2/User"))
        .and(query_param("$format", "json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "d": {"results": [
                {"__metadata": {"type": "SFOData.User"}, "userId": "1", "firstName": "A"}
            ]}
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/odata/v2/EmpJob"))
        .respond_with(ResponseTemplate::new(500).set_body_string("backend down"))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let template_path = dir.path().join("template.xlsx");
    let dictionary_path = dir.path().join("dictionary.xlsx");
    let report_path = dir.path().join("report.xlsx");
    write_template(&template_path);

    let host = server.uri().trim_start_matches("http://").to_string();
    let toml = format!(
        r#"
entities = ["User", "EmpJob"]

[auth]
client_id = "client"
user_id = "admin"
company_id = "ACME"
private_key = "KEY"
idp_url = "{uri}/oauth/idp"
token_url = "{uri}/oauth/token"
bearer_token = "static-token"

[server]
api_server = "{host}"
scheme = "http"

[paths]
template = {template:?}
dictionary_output = {dictionary:?}
report_output = {report:?}

[http]
timeout_secs = 10
"#,
        uri = server.uri(),
        host = host,
        template = template_path.display().to_string(),
        dictionary = dictionary_path.display().to_string(),
        report = report_path.display().to_string(),
    );
    let config = Config::from_toml(&toml).unwrap().to_runtime().unwrap();

    let summary = pipeline::run(&config).await.unwrap();
    assert_eq!(summary.dictionary_fields, 2);
    assert_eq!(summary.endpoints, 2);
    assert_eq!(summary.failed_endpoints, 1);
    assert_eq!(summary.sheets, vec!["Query User", "Query Job"]);

    let dictionary = Workbook::load(&dictionary_path).unwrap();
    let dictionary_sheet = dictionary.sheet(DICTIONARY_SHEET).unwrap();
    assert_eq!(dictionary_sheet.row_count(), 3);

    let report = Workbook::load(&report_path).unwrap();
    let user = report.sheet("Query User").unwrap();
    assert_eq!(user.text(0, 0), Some("Query User"));
    assert_eq!(user.text(12, 1), Some("Field"));
    assert_eq!(user.text(13, 1), Some("userId"));
    assert_eq!(user.text(13, 3), Some("d.results[0].userId"));
    assert_eq!(user.text(13, 5), Some("User ID"));
    assert_eq!(user.text(13, 8), Some("true"));
    assert_eq!(user.text(14, 1), Some("firstName"));
    assert_eq!(user.text(14, 5), None);
    assert_eq!(user.row_count(), 15);

    let job = report.sheet("Query Job").unwrap();
    assert!(job.text(11, 1).unwrap().starts_with("ERROR:"));
    assert_eq!(job.text(13, 1), None);

    let master = report.sheet("SF Master Table List").unwrap();
    assert!(master.text(1, 11).unwrap().contains("\"firstName\": \"A\""));

    let reference = report.sheet("SF Master Data Dictionary").unwrap();
    assert_eq!(reference.row_count(), 2);
    assert_eq!(reference.text(1, 1), Some("UserID"));
}

#[tokio::test]
async fn test_missing_template_aborts_before_network() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let toml = format!(
        "entities = [\"User\"]\n[server]\napi_server = \"{}\"\n[paths]\ntemplate = {:?}\nreport_output = {:?}\ndictionary_output = {:?}\n",
        server.uri().trim_start_matches("http://"),
        dir.path().join("missing.xlsx").display().to_string(),
        dir.path().join("report.xlsx").display().to_string(),
        dir.path().join("dictionary.xlsx").display().to_string(),
    );
    let config = Config::from_toml(&toml).unwrap().to_runtime().unwrap();

    assert!(pipeline::run(&config).await.is_err());
    assert!(server.received_requests().await.unwrap().is_empty());
    assert!(!dir.path().join("report.xlsx").exists());
}
