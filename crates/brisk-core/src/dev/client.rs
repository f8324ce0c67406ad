//! Browser runtime for live updates, served at [`CLIENT_PATH`](super::CLIENT_PATH).
//!
//! The page holds one bundle, so an `update` reloads the page. An `error`
//! shows an overlay on top of the last good build until the next update.

use super::WS_PATH;

const CLIENT_RUNTIME: &str = r"
(function () {
  var OVERLAY_ID = '__brisk_error_overlay';
  var connected = false;

  function showErrorOverlay(message) {
    var overlay = document.getElementById(OVERLAY_ID);
    if (!overlay) {
      overlay = document.createElement('div');
      overlay.id = OVERLAY_ID;
      overlay.style.cssText =
        'position: fixed; top: 0; left: 0; right: 0; bottom: 0;' +
        'background: rgba(0,0,0,0.9); color: #ff5555;' +
        'padding: 32px; font-family: monospace; font-size: 16px;' +
        'white-space: pre-wrap; overflow: auto; z-index: 999999;';
      document.body.appendChild(overlay);
    }
    overlay.textContent = 'Build Error:\n\n' + message;
    overlay.style.display = 'block';
  }

  function hideErrorOverlay() {
    var overlay = document.getElementById(OVERLAY_ID);
    if (overlay) overlay.style.display = 'none';
  }

  function handleMessage(msg) {
    switch (msg.type) {
      case 'connected':
        console.log('[brisk] connected, build ' + msg.generation);
        break;
      case 'update':
        hideErrorOverlay();
        console.log('[brisk] updated: ' + msg.modules.join(', '));
        location.reload();
        break;
      case 'error':
        console.error('[brisk] build error:', msg.message);
        showErrorOverlay(msg.message);
        break;
    }
  }

  function connect() {
    var protocol = location.protocol === 'https:' ? 'wss:' : 'ws:';
    var ws = new WebSocket(protocol + '//' + location.host + '__WS_PATH__');

    ws.onopen = function () {
      connected = true;
    };
    ws.onmessage = function (event) {
      handleMessage(JSON.parse(event.data));
    };
    ws.onclose = function () {
      if (connected) {
        console.log('[brisk] server connection lost. Polling for restart...');
        connected = false;
      }
      setTimeout(connect, 1000);
    };
  }

  connect();
})();
";

/// The client runtime script.
#[must_use]
pub fn client_runtime() -> String {
    CLIENT_RUNTIME.replace("__WS_PATH__", WS_PATH)
}
