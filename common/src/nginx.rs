pub const NGINX_CONFIG_PATH: &str = "/etc/nginx/nginx.conf";
pub const CATALOGUE_CERTS_DIR: &str = "/etc/catalogue/certs";
pub const CERT_PATH: &str = "/etc/catalogue/certs/catalogue.cert.pem";
pub const KEY_PATH: &str = "/etc/catalogue/certs/catalogue.key.pem";
pub const CA_CERT_PATH: &str = "/etc/catalogue/certs/ca.cert";

const HTTP_SERVICE: &str = r#"http {
    include            mime.types;
    default_type       application/octet-stream;
    sendfile           on;
    keepalive_timeout  65;

    upstream self {
      server localhost:80;
    }

    server {
        listen               80;
        server_name          localhost;
        root                 /web;

        error_page           500 502 503 504  /50x.html;
        location = /50x.html {
            root             /usr/share/nginx/html;
        }
    }
}
"#;

fn https_service() -> String {
    format!(
        r#"http {{
    include             mime.types;
    default_type        application/octet-stream;
    sendfile            on;
    ssl_session_cache   shared:SSL:10m;
    ssl_session_timeout 10m;

    server {{
        listen               443 ssl;
        server_name          localhost;
        keepalive_timeout    70;
        root                 /web;
        ssl_certificate      {CERT_PATH};
        ssl_certificate_key  {KEY_PATH};
        ssl_protocols        TLSv1 TLSv1.1 TLSv1.2 TLSv1.3;
        ssl_ciphers          HIGH:!aNULL:!MD5;

        error_page           500 502 503 504  /50x.html;
        location = /50x.html {{
            root             /usr/share/nginx/html;
        }}
    }}
}}
"#
    )
}

/// Builds the whole `nginx.conf`, the only input being whether TLS is served
#[derive(Clone, Copy, Debug, Default)]
pub struct NginxConfigBuilder {
    tls: bool,
}

impl NginxConfigBuilder {
    #[must_use]
    pub fn new(tls: bool) -> NginxConfigBuilder {
        NginxConfigBuilder { tls }
    }

    pub fn build(&self) -> String {
        let service = if self.tls {
            https_service()
        } else {
            HTTP_SERVICE.to_string()
        };
        format!("worker_processes  1;\nevents {{\n    worker_connections  1024;\n}}\n\n{service}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_variant() {
        let conf = NginxConfigBuilder::new(false).build();
        assert!(conf.starts_with("worker_processes  1;"));
        assert!(conf.contains("listen               80;"));
        assert!(!conf.contains("ssl_certificate"));
    }

    #[test]
    fn test_https_variant() {
        let conf = NginxConfigBuilder::new(true).build();
        assert!(conf.contains("listen               443 ssl;"));
        assert!(conf.contains(&format!("ssl_certificate      {CERT_PATH};")));
        assert!(conf.contains(&format!("ssl_certificate_key  {KEY_PATH};")));
        assert!(conf.contains("ssl_protocols        TLSv1 TLSv1.1 TLSv1.2 TLSv1.3;"));
        assert!(conf.contains("ssl_ciphers          HIGH:!aNULL:!MD5;"));
        assert!(!conf.contains("listen               80;"));
    }

    #[test]
    fn test_certificate_paths_live_in_certs_dir() {
        for p in [CERT_PATH, KEY_PATH, CA_CERT_PATH] {
            assert!(p.starts_with(CATALOGUE_CERTS_DIR));
        }
    }
}
