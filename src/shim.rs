//! Rendering of the Node.js shim bridging invocation events to the server.
//!
//! The shim is appended to every artifact under [`SHIM_FILE_NAME`] and
//! registered as the function handler. On each invocation it lazily spawns
//! `./server` exactly once, treats the first stdout or stderr output as the
//! readiness signal, and then proxies the event as a local HTTP request,
//! buffering the response into the structured result the gateway
//! integration expects.

/// File name of the shim entry inside the artifact.
pub const SHIM_FILE_NAME: &str = "liftoff_shim.js";

/// Handler registered on the function (`<file stem>.<export>`).
pub const SHIM_HANDLER: &str = "liftoff_shim.proxy";

/// Substitution marker for the server port.
const PORT_MARKER: &str = "{{port}}";

const SHIM_TEMPLATE: &str = r"'use strict';

var http = require('http');
var spawn = require('child_process').spawn;
var qs = require('querystring');

var starting = false;
var ready = false;

exports.proxy = function proxy(event, context) {
  bootServer(event);
  if (!ready) {
    setTimeout(function () {
      proxy(event, context);
    }, 1);
    return;
  }
  forward(event, context);
};

function bootServer(event) {
  if (starting) {
    return;
  }
  starting = true;
  var server = spawn('./server', [], { env: event.stageVariables });

  server.stdout.on('data', function (data) {
    ready = true;
    console.log(String(data));
  });

  server.stderr.on('data', function (data) {
    ready = true;
    console.error(String(data));
  });
}

function forward(event, context) {
  var query = event.queryStringParameters
    ? '?' + qs.stringify(event.queryStringParameters)
    : '';
  var request = http.request({
    port: {{port}},
    method: event.httpMethod,
    path: event.path + query,
    headers: event.headers
  }, function (response) {
    var chunks = [];

    response.on('data', function (chunk) {
      chunks.push(Buffer.from(chunk));
    });

    response.on('end', function () {
      context.succeed({
        statusCode: response.statusCode,
        headers: response.headers,
        body: Buffer.concat(chunks).toString()
      });
    });
  });

  if (event.body) {
    request.setHeader('Content-Length', Buffer.byteLength(event.body));
    request.write(event.body);
  }
  request.end();
}
";

/// Renders the shim source for the configured server port.
#[must_use]
pub fn render_shim(port: u16) -> String {
    SHIM_TEMPLATE.replace(PORT_MARKER, &port.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rendered_shim_embeds_the_configured_port() {
        let source = render_shim(3000);
        assert!(source.contains("port: 3000,"));
        assert!(!source.contains(PORT_MARKER));
    }

    #[test]
    fn shim_spawns_the_server_exactly_once() {
        let source = render_shim(3000);
        assert_eq!(source.matches("spawn('./server'").count(), 1);
        // The guard flips before the spawn, so overlapping invocations
        // cannot start a second process.
        assert!(source.contains("if (starting)"));
        assert!(source.contains("starting = true;"));
    }

    #[test]
    fn shim_waits_for_first_output_before_proxying() {
        let source = render_shim(3000);
        assert!(source.contains("ready = true;"));
        assert!(source.contains("setTimeout"));
    }

    #[test]
    fn shim_returns_a_buffered_structured_response() {
        let source = render_shim(3000);
        assert!(source.contains("statusCode: response.statusCode"));
        assert!(source.contains("Buffer.concat(chunks).toString()"));
    }

    #[test]
    fn handler_matches_the_shim_file_name() {
        let stem = SHIM_FILE_NAME
            .strip_suffix(".js")
            .expect("shim file must be a .js file");
        assert_eq!(SHIM_HANDLER, format!("{stem}.proxy"));
    }
}
