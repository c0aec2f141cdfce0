//! API documentation served at `/api/docs`

use serde_json::{json, Value};

pub const DOCS_PATH: &str = "/api/docs";
pub const OPENAPI_PATH: &str = "/api/docs/openapi.json";

/// OpenAPI 3.0 description of the service.
pub fn openapi_document(server_url: &str) -> Value {
    let error_schema = |example: &str| {
        json!({
            "type": "object",
            "properties": {
                "error": { "type": "string", "example": example }
            }
        })
    };

    json!({
        "openapi": "3.0.0",
        "info": {
            "title": "PDF Generator API",
            "version": env!("CARGO_PKG_VERSION"),
            "description": "API to generate PDF from a given URL using headless Chrome"
        },
        "servers": [
            { "url": server_url, "description": "Local server" }
        ],
        "tags": [
            { "name": "PDF", "description": "PDF Generation APIs" }
        ],
        "paths": {
            "/generate-pdf": {
                "post": {
                    "summary": "Generate PDF from a URL",
                    "description": "Accepts a public URL and returns the generated PDF file.\nThe page is rendered in headless Chrome and printed in A4 format.",
                    "tags": ["PDF"],
                    "requestBody": {
                        "required": true,
                        "content": {
                            "application/json": {
                                "schema": {
                                    "type": "object",
                                    "required": ["url"],
                                    "properties": {
                                        "url": {
                                            "type": "string",
                                            "description": "Publicly accessible webpage URL",
                                            "example": "https://example.com"
                                        }
                                    }
                                },
                                "examples": {
                                    "ExampleWebsite": {
                                        "summary": "Generate PDF from example.com",
                                        "value": { "url": "https://example.com" }
                                    },
                                    "Wikipedia": {
                                        "summary": "Generate PDF from wikipedia",
                                        "value": { "url": "https://www.wikipedia.org" }
                                    }
                                }
                            }
                        }
                    },
                    "responses": {
                        "200": {
                            "description": "PDF generated successfully",
                            "content": {
                                "application/pdf": {
                                    "schema": { "type": "string", "format": "binary" }
                                }
                            }
                        },
                        "400": {
                            "description": "URL is required",
                            "content": {
                                "application/json": { "schema": error_schema("URL is required") }
                            }
                        },
                        "500": {
                            "description": "Failed to generate PDF",
                            "content": {
                                "application/json": { "schema": error_schema("Failed to generate PDF") }
                            }
                        }
                    }
                }
            }
        }
    })
}

/// Swagger UI shell; the bundle comes from a CDN and reads [`OPENAPI_PATH`].
pub fn swagger_ui_html() -> String {
    format!(
        r##"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>PDF Generator API</title>
  <link rel="stylesheet" href="https://unpkg.com/swagger-ui-dist@5/swagger-ui.css">
</head>
<body>
  <div id="swagger-ui"></div>
  <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-bundle.js" crossorigin></script>
  <script>
    window.onload = () => {{
      window.ui = SwaggerUIBundle({{ url: "{OPENAPI_PATH}", dom_id: "#swagger-ui" }});
    }};
  </script>
</body>
</html>
"##
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_describes_generate_pdf() {
        let doc = openapi_document("http://localhost:3000");
        let post = &doc["paths"]["/generate-pdf"]["post"];

        assert_eq!(doc["openapi"], "3.0.0");
        assert_eq!(doc["servers"][0]["url"], "http://localhost:3000");
        assert_eq!(post["tags"][0], "PDF");
        assert_eq!(
            post["requestBody"]["content"]["application/json"]["schema"]["required"][0],
            "url"
        );
        assert!(post["responses"]["200"]["content"]["application/pdf"].is_object());
        assert_eq!(
            post["responses"]["400"]["content"]["application/json"]["schema"]["properties"]
                ["error"]["example"],
            "URL is required"
        );
    }

    #[test]
    fn test_swagger_page_points_at_document() {
        let html = swagger_ui_html();
        assert!(html.contains(OPENAPI_PATH));
        assert!(html.contains("SwaggerUIBundle"));
        assert!(html.contains(r##"dom_id: "#swagger-ui""##));
        assert!(html.trim_end().ends_with("</html>"));
    }
}
